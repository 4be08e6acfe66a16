// src/dataset/overrides.rs
//! Operator-maintained corrections, `{ "data": [ ... ] }`. Never written by
//! the scrape path.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::dataset::types::Record;

#[derive(Debug, Deserialize)]
#[serde(bound = "R: Record")]
struct OverrideFile<R> {
    #[serde(default = "Vec::new")]
    data: Vec<R>,
}

pub struct OverrideStore<R> {
    path: PathBuf,
    loaded: RwLock<Option<Vec<R>>>,
}

impl<R: Record> OverrideStore<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// In-memory copy, read from disk on first use.
    pub fn load(&self) -> Vec<R> {
        {
            let guard = self.loaded.read().unwrap_or_else(|p| p.into_inner());
            if let Some(records) = guard.as_ref() {
                return records.clone();
            }
        }
        let mut guard = self.loaded.write().unwrap_or_else(|p| p.into_inner());
        guard.get_or_insert_with(|| self.read_file()).clone()
    }

    /// Re-read from disk, replacing whatever was loaded before.
    pub fn reload(&self) -> Vec<R> {
        let fresh = self.read_file();
        let mut guard = self.loaded.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(fresh.clone());
        tracing::info!(target: "dataset", dataset = R::KIND.as_str(), count = fresh.len(), "overrides reloaded");
        fresh
    }

    fn read_file(&self) -> Vec<R> {
        let dataset = R::KIND.as_str();
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(target: "dataset", dataset, path = %self.path.display(), "no override file");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(target: "dataset", dataset, path = %self.path.display(), error = %e, "override file unreadable; ignoring");
                return Vec::new();
            }
        };
        match serde_json::from_str::<OverrideFile<R>>(&raw) {
            Ok(file) => file.data,
            Err(e) => {
                tracing::warn!(target: "dataset", dataset, path = %self.path.display(), error = %e, "override file malformed; ignoring");
                Vec::new()
            }
        }
    }
}
