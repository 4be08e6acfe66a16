// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod chat;
pub mod config;
pub mod dataset;
pub mod metrics;

use std::sync::Arc;

pub use crate::api::{create_router, AppState};

use crate::chat::llm::build_llm_client;
use crate::chat::store::InMemoryChatStore;
use crate::chat::ChatService;
use crate::config::{AiConfig, DatasetsConfig};
use crate::dataset::Dataset;

/// Build the shared pipeline objects once at startup.
pub fn build_app_state(datasets: &DatasetsConfig, ai: &AiConfig) -> anyhow::Result<AppState> {
    let spaces = Arc::new(Dataset::spaces(datasets)?);
    let programs = Arc::new(Dataset::programs(datasets)?);
    let chat = Arc::new(ChatService::new(
        spaces.clone(),
        programs.clone(),
        Arc::new(InMemoryChatStore::new()),
        build_llm_client(ai),
    ));
    tracing::info!(
        data_dir = %datasets.data_dir.display(),
        llm = chat.llm_provider(),
        "app state ready"
    );
    Ok(AppState {
        spaces,
        programs,
        chat,
    })
}
