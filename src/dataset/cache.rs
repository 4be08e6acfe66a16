// src/dataset/cache.rs
//! TTL cache of the last scrape, persisted as one JSON file per dataset:
//! `{ "cached_at": "<RFC 3339>", "data": [ ... ] }`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::dataset::scrape::Scraper;
use crate::dataset::types::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "R: Record")]
pub struct CacheEntry<R> {
    #[serde(deserialize_with = "deserialize_cached_at")]
    pub cached_at: DateTime<Utc>,
    #[serde(default = "Vec::new")]
    pub data: Vec<R>,
}

impl<R> CacheEntry<R> {
    pub fn new(cached_at: DateTime<Utc>, data: Vec<R>) -> Self {
        Self { cached_at, data }
    }

    /// Stale once `now - cached_at >= ttl`.
    pub fn is_fresh(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.cached_at < ttl
    }
}

/// Accepts RFC 3339 and, for files written by older deployments, naive
/// ISO-8601 timestamps (read as UTC).
fn deserialize_cached_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_cached_at(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad cached_at: {raw}")))
}

pub(crate) fn parse_cached_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|n| n.and_utc())
}

/// What a refresh produced. A failed write still hands back the records.
#[derive(Debug, Clone)]
pub struct RefreshOutcome<R> {
    pub records: Vec<R>,
    pub fetched_at: DateTime<Utc>,
    pub persisted: bool,
}

pub struct CacheStore<R> {
    path: PathBuf,
    // at most one scrape per dataset in flight
    refresh_guard: tokio::sync::Mutex<()>,
    _records: PhantomData<fn() -> R>,
}

impl<R: Record> CacheStore<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            refresh_guard: tokio::sync::Mutex::new(()),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted entry, or `None` if the file is missing, unreadable or
    /// malformed.
    pub fn read_entry(&self) -> Option<CacheEntry<R>> {
        let dataset = R::KIND.as_str();
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(target: "dataset", dataset, path = %self.path.display(), "no cache file yet");
                return None;
            }
            Err(e) => {
                tracing::warn!(target: "dataset", dataset, path = %self.path.display(), error = %e, "cache file unreadable; treating as absent");
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry<R>>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(target: "dataset", dataset, path = %self.path.display(), error = %e, "cache file malformed; treating as absent");
                None
            }
        }
    }

    /// Persisted records without ever scraping, even when stale.
    pub fn peek(&self) -> Vec<R> {
        self.read_entry().map(|e| e.data).unwrap_or_default()
    }

    /// Overwrite the cache file (tmp file + rename).
    pub fn write_entry(&self, entry: &CacheEntry<R>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating cache dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(entry).context("serializing cache entry")?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            f.write_all(&body)
                .with_context(|| format!("writing {}", tmp.display()))?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    fn fresh_entry(&self, ttl: chrono::Duration) -> Option<CacheEntry<R>> {
        self.read_entry().filter(|e| e.is_fresh(ttl, Utc::now()))
    }

    /// Cached records while younger than `ttl`; otherwise scrape, persist
    /// and return the new records.
    pub async fn get_or_refresh(&self, scraper: &dyn Scraper<R>, ttl: chrono::Duration) -> Vec<R> {
        let dataset = R::KIND.as_str();
        if let Some(entry) = self.fresh_entry(ttl) {
            counter!("dataset_cache_hits_total", "dataset" => dataset).increment(1);
            return entry.data;
        }

        let _guard = self.refresh_guard.lock().await;
        // Another request may have refreshed while we waited.
        if let Some(entry) = self.fresh_entry(ttl) {
            counter!("dataset_cache_hits_total", "dataset" => dataset).increment(1);
            return entry.data;
        }

        counter!("dataset_cache_misses_total", "dataset" => dataset).increment(1);
        tracing::info!(target: "dataset", dataset, scraper = scraper.name(), "cache stale or missing; refreshing");
        self.refresh_locked(scraper).await.records
    }

    /// Scrape and persist regardless of age.
    pub async fn force_refresh(&self, scraper: &dyn Scraper<R>) -> RefreshOutcome<R> {
        let _guard = self.refresh_guard.lock().await;
        tracing::info!(target: "dataset", dataset = R::KIND.as_str(), scraper = scraper.name(), "forced refresh");
        self.refresh_locked(scraper).await
    }

    async fn refresh_locked(&self, scraper: &dyn Scraper<R>) -> RefreshOutcome<R> {
        let dataset = R::KIND.as_str();
        let records = scraper.scrape().await;

        let now = Utc::now();
        let fetched_at = match self.read_entry() {
            Some(prev) if prev.cached_at > now => prev.cached_at,
            _ => now,
        };

        let entry = CacheEntry::new(fetched_at, records);
        let persisted = match self.write_entry(&entry) {
            Ok(()) => {
                gauge!("dataset_last_refresh_ts", "dataset" => dataset)
                    .set(fetched_at.timestamp() as f64);
                tracing::info!(target: "dataset", dataset, count = entry.data.len(), path = %self.path.display(), "cache written");
                true
            }
            Err(e) => {
                counter!("dataset_cache_write_errors_total", "dataset" => dataset).increment(1);
                tracing::warn!(target: "dataset", dataset, path = %self.path.display(), error = ?e, "cache write failed; serving in-memory result");
                false
            }
        };

        RefreshOutcome {
            records: entry.data,
            fetched_at,
            persisted,
        }
    }
}
