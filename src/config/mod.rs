// src/config/mod.rs
pub mod ai;
pub mod datasets;

pub use ai::AiConfig;
pub use datasets::{DatasetConfig, DatasetsConfig};
