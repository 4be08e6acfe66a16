//! Busan youth chatbot backend: binary entrypoint.
//! Boots the Axum HTTP server with the dataset pipelines, chat service and
//! Prometheus metrics.

use busan_youth_bot::config::ai::DEFAULT_AI_CONFIG_PATH;
use busan_youth_bot::config::{AiConfig, DatasetsConfig};
use busan_youth_bot::metrics::Metrics;
use busan_youth_bot::{build_app_state, create_router};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` filter (default `busan_youth_bot=info,warn`); `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("busan_youth_bot=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    // The platform runtime may have installed a subscriber already.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let datasets = DatasetsConfig::load_default().map_err(shuttle_runtime::Error::Custom)?;
    let ai = AiConfig::load_or_disabled(DEFAULT_AI_CONFIG_PATH);
    let metrics = Metrics::init(&datasets).map_err(shuttle_runtime::Error::Custom)?;
    let state = build_app_state(&datasets, &ai).map_err(shuttle_runtime::Error::Custom)?;

    let router = create_router(state).merge(metrics.router());
    Ok(router.into())
}
