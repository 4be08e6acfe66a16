// src/dataset/mod.rs
//! Scrape → cache → override merge → query pipeline for the two municipal
//! datasets. One `Dataset` per record type is built at startup and shared
//! with the handlers.

pub mod cache;
pub mod merge;
pub mod overrides;
pub mod providers;
pub mod query;
pub mod scrape;
pub mod types;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DatasetsConfig;
use crate::dataset::cache::{CacheStore, RefreshOutcome};
use crate::dataset::overrides::OverrideStore;
use crate::dataset::scrape::Scraper;
use crate::dataset::query::SpaceConditions;
use crate::dataset::types::{DatasetKind, Program, QueryResult, Record, Space};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_pages_total", "Listing pages requested by scrapers.");
        describe_counter!(
            "scrape_page_errors_total",
            "Listing pages skipped after a fetch or parse failure."
        );
        describe_counter!("scrape_records_total", "Valid records produced by scrapes.");
        describe_counter!("dataset_cache_hits_total", "Reads served from a fresh cache.");
        describe_counter!(
            "dataset_cache_misses_total",
            "Reads that found the cache stale or missing and scraped."
        );
        describe_counter!(
            "dataset_cache_write_errors_total",
            "Cache writes that failed (records still served)."
        );
        describe_gauge!(
            "dataset_last_refresh_ts",
            "Unix ts of the last persisted scrape per dataset."
        );
    });
}

/// Counts for operational visibility. Computed without scraping.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatus {
    pub dataset: &'static str,
    pub cache_count: usize,
    pub override_count: usize,
    pub merged_count: usize,
    pub cached_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub ttl_hours: i64,
}

pub struct Dataset<R: Record> {
    cache: CacheStore<R>,
    overrides: OverrideStore<R>,
    scraper: Arc<dyn Scraper<R>>,
    ttl: chrono::Duration,
}

impl<R: Record> Dataset<R> {
    pub fn new(
        cache_path: impl Into<PathBuf>,
        override_path: impl Into<PathBuf>,
        scraper: Arc<dyn Scraper<R>>,
        ttl: chrono::Duration,
    ) -> Self {
        ensure_metrics_described();
        Self {
            cache: CacheStore::new(cache_path),
            overrides: OverrideStore::new(override_path),
            scraper,
            ttl,
        }
    }

    pub fn cache(&self) -> &CacheStore<R> {
        &self.cache
    }

    pub fn overrides(&self) -> &OverrideStore<R> {
        &self.overrides
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Cache (refreshed if stale) merged with overrides. Rebuilt on every call.
    pub async fn merged(&self) -> Vec<R> {
        let cached = self.cache.get_or_refresh(self.scraper.as_ref(), self.ttl).await;
        merge::merge(&cached, &self.overrides.load())
    }

    async fn select<F>(&self, filter: F) -> QueryResult<Vec<R>>
    where
        F: FnOnce(&[R]) -> Vec<R> + Send,
    {
        let all = self.merged().await;
        if all.is_empty() {
            return QueryResult::Unavailable;
        }
        let hits = filter(&all);
        if hits.is_empty() {
            QueryResult::NoMatch
        } else {
            QueryResult::Found(hits)
        }
    }

    pub async fn list_all(&self) -> QueryResult<Vec<R>> {
        self.select(|all| all.to_vec()).await
    }

    pub async fn list_by_region(&self, region: &str) -> QueryResult<Vec<R>> {
        self.select(|all| query::by_region(all, region)).await
    }

    pub async fn list_by_keyword(&self, keyword: &str) -> QueryResult<Vec<R>> {
        self.select(|all| query::by_keyword(all, keyword)).await
    }

    pub async fn list_by_tag(&self, tag: &str) -> QueryResult<Vec<R>> {
        self.select(|all| query::by_tag(all, tag)).await
    }

    pub async fn get_detail(&self, name: &str) -> QueryResult<R> {
        let all = self.merged().await;
        if all.is_empty() {
            return QueryResult::Unavailable;
        }
        match query::by_name(&all, name) {
            Some(r) => QueryResult::Found(r),
            None => QueryResult::NoMatch,
        }
    }

    pub async fn force_refresh(&self) -> RefreshOutcome<R> {
        self.cache.force_refresh(self.scraper.as_ref()).await
    }

    /// Re-read the override file; returns how many overrides are now active.
    pub fn reload_overrides(&self) -> usize {
        self.overrides.reload().len()
    }

    pub fn status(&self) -> DatasetStatus {
        let entry = self.cache.read_entry();
        let overrides = self.overrides.load();
        let (cached, cached_at) = match entry {
            Some(e) => (e.data, Some(e.cached_at)),
            None => (Vec::new(), None),
        };
        let stale = cached_at
            .map(|at| Utc::now() - at >= self.ttl)
            .unwrap_or(true);
        DatasetStatus {
            dataset: R::KIND.as_str(),
            cache_count: cached.len(),
            override_count: overrides.len(),
            merged_count: merge::merge(&cached, &overrides).len(),
            cached_at,
            stale,
            ttl_hours: self.ttl.num_hours(),
        }
    }

    // ----- chat replies -----

    pub async fn region_reply(&self, region: &str) -> String {
        match self.list_by_region(region).await {
            QueryResult::Found(hits) => query::render_region_listing(region, &hits),
            QueryResult::NoMatch => query::region_no_match_message(R::KIND, region),
            QueryResult::Unavailable => query::unavailable_message(R::KIND),
        }
    }

    pub async fn keyword_reply(&self, keyword: &str) -> String {
        match self.list_by_keyword(keyword).await {
            QueryResult::Found(hits) => query::render_keyword_listing(keyword, &hits),
            QueryResult::NoMatch => query::keyword_no_match_message(R::KIND, keyword),
            QueryResult::Unavailable => query::unavailable_message(R::KIND),
        }
    }

    pub async fn tag_reply(&self, tag: &str) -> String {
        match self.list_by_tag(tag).await {
            QueryResult::Found(hits) => query::render_tag_listing(tag, &hits),
            QueryResult::NoMatch => query::tag_no_match_message(tag),
            QueryResult::Unavailable => query::unavailable_message(R::KIND),
        }
    }

    pub async fn overview_reply(&self) -> String {
        match self.list_all().await {
            QueryResult::Found(all) => query::render_overview(&all),
            _ => query::unavailable_message(R::KIND),
        }
    }
}

impl Dataset<Space> {
    pub fn spaces(cfg: &DatasetsConfig) -> Result<Self> {
        let c = &cfg.spaces;
        Ok(Self::new(
            cfg.resolve(&c.cache_file),
            cfg.resolve(&c.override_file),
            Arc::new(providers::spaces::scraper(c)?),
            c.ttl(),
        ))
    }

    /// Reply to the condition search form (region / headcount / purpose).
    pub async fn condition_reply(&self, conditions: &SpaceConditions) -> String {
        if conditions.is_empty() {
            return query::CONDITIONS_REQUIRED.to_string();
        }
        let Some(all) = self.list_all().await.found() else {
            return query::unavailable_message(DatasetKind::Spaces);
        };
        let hits = query::by_conditions(&all, conditions);
        tracing::debug!(target: "dataset", hits = hits.len(), ?conditions, "condition search");
        if hits.is_empty() {
            query::condition_no_match_message(conditions)
        } else {
            query::render_condition_results(conditions, &hits)
        }
    }
}

impl Dataset<Program> {
    pub fn programs(cfg: &DatasetsConfig) -> Result<Self> {
        let c = &cfg.programs;
        Ok(Self::new(
            cfg.resolve(&c.cache_file),
            cfg.resolve(&c.override_file),
            Arc::new(providers::programs::scraper(c)?),
            c.ttl(),
        ))
    }

    /// `None` when no programs are available, so callers can fall through.
    pub async fn digest_reply(&self, limit: usize) -> Option<String> {
        self.list_all()
            .await
            .found()
            .map(|all| query::render_program_digest(&all, limit))
    }
}
