// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod discovery;
pub mod extract;
pub mod index;
pub mod metrics;
pub mod normalize;
pub mod pulse;
pub mod relevance;
pub mod research;
pub mod sources;
pub mod store;

pub use crate::api::{router, AppState};
pub use crate::config::DiscoveryConfig;
pub use crate::discovery::Discovery;

use axum::Router;
use tracing::info;

/// Wire live adapters, extractor, store and index from configuration.
pub fn build_discovery(cfg: &DiscoveryConfig) -> anyhow::Result<Discovery> {
    let discovery = Discovery {
        sources: sources::SourceSet::from_config(&cfg.sources)?,
        calibration: cfg.calibration,
        extractor: extract::llm::build_extractor(&cfg.extraction),
        store: store::connect(&cfg.store),
        index: index::build_index(&cfg.index),
    };
    info!(
        store = discovery.store.mode(),
        extractor = discovery.extractor.name(),
        index = discovery.index.name(),
        "discovery service wired"
    );
    Ok(discovery)
}

/// Full in-process app (without the Prometheus route, which needs the
/// process-global recorder).
pub async fn app() -> anyhow::Result<Router> {
    let cfg = DiscoveryConfig::load()?;
    let discovery = build_discovery(&cfg)?;
    Ok(router(AppState::new(discovery)))
}
