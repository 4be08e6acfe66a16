// tests/common/mod.rs
// Shared helpers for integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use busan_youth_bot::dataset::cache::{CacheEntry, CacheStore};
use busan_youth_bot::dataset::scrape::Scraper;
use busan_youth_bot::dataset::types::{Program, Record, Space};
use busan_youth_bot::dataset::Dataset;
use chrono::Utc;

/// Returns a fixed list and counts how often it was asked.
pub struct CountingScraper<R> {
    records: Vec<R>,
    delay: Duration,
    calls: AtomicUsize,
}

impl<R: Record> CountingScraper<R> {
    pub fn new(records: Vec<R>) -> Arc<Self> {
        Arc::new(Self {
            records,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(records: Vec<R>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            records,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Record> Scraper<R> for CountingScraper<R> {
    async fn scrape(&self) -> Vec<R> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.records.clone()
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

pub fn space(name: &str, region: &str) -> Space {
    Space {
        region: Some(region.to_string()),
        ..Space::named(name)
    }
}

pub fn program(title: &str, region: Option<&str>) -> Program {
    Program {
        region: region.map(str::to_string),
        status: Some("모집중".to_string()),
        ..Program::titled(title)
    }
}

/// Persist `records` as a cache entry `age` old.
pub fn write_cache<R: Record>(path: &Path, records: Vec<R>, age: chrono::Duration) {
    let store: CacheStore<R> = CacheStore::new(path);
    store
        .write_entry(&CacheEntry::new(Utc::now() - age, records))
        .expect("write cache fixture");
}

pub fn write_overrides<R: Record>(path: &Path, records: &[R]) {
    let body = serde_json::json!({ "data": records });
    std::fs::write(path, serde_json::to_vec_pretty(&body).unwrap()).expect("write overrides");
}

/// Dataset in `dir` with a fresh cache holding `cached` (if any).
pub fn dataset_with<R: Record>(
    dir: &Path,
    cached: Option<Vec<R>>,
    scraper: Arc<CountingScraper<R>>,
) -> Dataset<R> {
    let kind = R::KIND.as_str();
    let cache_path = dir.join(format!("{kind}_cache.json"));
    let override_path = dir.join(format!("{kind}_overrides.json"));
    if let Some(records) = cached {
        write_cache(&cache_path, records, chrono::Duration::zero());
    }
    Dataset::new(cache_path, override_path, scraper, chrono::Duration::hours(24))
}
