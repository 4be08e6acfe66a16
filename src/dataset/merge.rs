// src/dataset/merge.rs
use std::collections::{HashMap, HashSet};

use crate::dataset::types::Record;

/// Combine cached records with operator overrides, keyed by exact name.
///
/// Cache order is kept for every cached name (override content wins in the
/// cached position); override-only records follow in override order.
/// Duplicates within one source are not collapsed. With duplicate names inside
/// `overrides`, the last one is the replacement for cached records.
pub fn merge<R: Record>(cached: &[R], overrides: &[R]) -> Vec<R> {
    if overrides.is_empty() {
        return cached.to_vec();
    }

    let by_name: HashMap<&str, &R> = overrides.iter().map(|o| (o.name(), o)).collect();

    let mut out = Vec::with_capacity(cached.len() + overrides.len());
    let mut cached_names: HashSet<&str> = HashSet::with_capacity(cached.len());
    for rec in cached {
        cached_names.insert(rec.name());
        match by_name.get(rec.name()) {
            Some(over) => out.push((*over).clone()),
            None => out.push(rec.clone()),
        }
    }

    for over in overrides {
        if !cached_names.contains(over.name()) {
            out.push(over.clone());
        }
    }
    out
}
