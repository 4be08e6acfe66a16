// src/dataset/scrape.rs
//! Paged listing scraper.
//!
//! A scrape walks pages 1..=max_pages, sleeping `delay` before every fetch
//! after the first one, and stops at the first page that yields no records.
//! A failed page is logged and skipped. The scraper never returns an error:
//! total failure is an empty list.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::Url;
use std::marker::PhantomData;
use std::time::Duration;

use crate::config::datasets::{candidate_urls, DatasetConfig};
use crate::dataset::types::Record;

/// Produces the current list of records from the external site.
#[async_trait]
pub trait Scraper<R>: Send + Sync {
    async fn scrape(&self) -> Vec<R>;
    fn name(&self) -> &'static str;
}

/// Turns one listing page into valid records (items failing the per-item
/// filter are dropped).
pub type ExtractFn<R> = fn(&str, &Url) -> Vec<R>;

pub enum PageSource {
    /// Canned pages, page N is `pages[N - 1]`; `None` simulates a failed fetch
    /// and a page past the end is empty.
    Fixture(Vec<Option<String>>),
    Http {
        client: reqwest::Client,
        first_page_url: String,
        page_url_templates: Vec<String>,
    },
}

impl PageSource {
    pub fn fixture<S: Into<String>>(pages: Vec<S>) -> Self {
        PageSource::Fixture(pages.into_iter().map(|p| Some(p.into())).collect())
    }

    pub fn fixture_with_failures(pages: Vec<Option<String>>) -> Self {
        PageSource::Fixture(pages)
    }

    pub fn http(cfg: &DatasetConfig) -> Result<Self> {
        use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.8,en-US;q=0.5,en;q=0.3"),
        );

        let client = reqwest::Client::builder()
            .user_agent(concat!(
                "busan-youth-bot/",
                env!("CARGO_PKG_VERSION"),
                " (+https://young.busan.go.kr)"
            ))
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .timeout(cfg.request_timeout())
            .build()
            .context("building listing http client")?;

        Ok(PageSource::Http {
            client,
            first_page_url: cfg.first_page_url.clone(),
            page_url_templates: cfg.page_url_templates.clone(),
        })
    }
}

pub struct ListingScraper<R> {
    label: &'static str,
    source: PageSource,
    base: Url,
    max_pages: u32,
    delay: Duration,
    extract: ExtractFn<R>,
    _records: PhantomData<fn() -> R>,
}

impl<R: Record> ListingScraper<R> {
    pub fn new(label: &'static str, source: PageSource, base: Url, extract: ExtractFn<R>) -> Self {
        Self {
            label,
            source,
            base,
            max_pages: 3,
            delay: Duration::from_secs(1),
            extract,
            _records: PhantomData,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// HTTP scraper configured from a dataset section.
    pub fn from_config(label: &'static str, cfg: &DatasetConfig, extract: ExtractFn<R>) -> Result<Self> {
        let base = Url::parse(&cfg.base_url)
            .with_context(|| format!("invalid base_url {}", cfg.base_url))?;
        Ok(Self::new(label, PageSource::http(cfg)?, base, extract)
            .with_max_pages(cfg.max_pages)
            .with_delay(cfg.page_delay()))
    }

    /// `Ok(empty)` means the page was reachable but had no valid records.
    async fn scrape_page(&self, page: u32, first_fetch: &mut bool) -> Result<Vec<R>> {
        match &self.source {
            PageSource::Fixture(pages) => {
                self.politeness_pause(first_fetch).await;
                match pages.get(page as usize - 1) {
                    Some(Some(html)) => Ok((self.extract)(html, &self.base)),
                    Some(None) => Err(anyhow!("fixture page {page} unavailable")),
                    None => Ok(Vec::new()),
                }
            }
            PageSource::Http {
                client,
                first_page_url,
                page_url_templates,
            } => {
                let mut reached = false;
                let mut last_err = None;
                for url in candidate_urls(first_page_url, page_url_templates, page) {
                    self.politeness_pause(first_fetch).await;
                    match fetch_html(client, &url).await {
                        Ok(body) => {
                            reached = true;
                            let records = (self.extract)(&body, &self.base);
                            if !records.is_empty() {
                                return Ok(records);
                            }
                            tracing::debug!(target: "scrape", dataset = self.label, %url, "no records under this url");
                        }
                        Err(e) => {
                            tracing::warn!(target: "scrape", dataset = self.label, %url, error = ?e, "page fetch failed");
                            last_err = Some(e);
                        }
                    }
                }
                if reached {
                    Ok(Vec::new())
                } else {
                    Err(last_err.unwrap_or_else(|| anyhow!("no candidate urls for page {page}")))
                }
            }
        }
    }

    async fn politeness_pause(&self, first_fetch: &mut bool) {
        if *first_fetch {
            *first_fetch = false;
        } else if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl<R: Record> Scraper<R> for ListingScraper<R> {
    async fn scrape(&self) -> Vec<R> {
        let dataset = R::KIND.as_str();
        tracing::info!(target: "scrape", dataset = self.label, max_pages = self.max_pages, "scrape started");

        let mut out = Vec::new();
        let mut first_fetch = true;
        for page in 1..=self.max_pages {
            counter!("scrape_pages_total", "dataset" => dataset).increment(1);
            match self.scrape_page(page, &mut first_fetch).await {
                Ok(records) if records.is_empty() => {
                    tracing::info!(target: "scrape", dataset = self.label, page, "no records on page; stopping");
                    break;
                }
                Ok(records) => {
                    tracing::debug!(target: "scrape", dataset = self.label, page, count = records.len(), "page scraped");
                    out.extend(records);
                }
                Err(e) => {
                    counter!("scrape_page_errors_total", "dataset" => dataset).increment(1);
                    tracing::warn!(target: "scrape", dataset = self.label, page, error = ?e, "page skipped");
                }
            }
        }

        counter!("scrape_records_total", "dataset" => dataset).increment(out.len() as u64);
        tracing::info!(target: "scrape", dataset = self.label, count = out.len(), "scrape finished");
        out
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {url}: HTTP {status}");
    }
    resp.text()
        .await
        .with_context(|| format!("reading body of {url}"))
}
