//! Frontier Map: Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, metrics and middleware.

use frontier_map::metrics::Metrics;
use frontier_map::{build_discovery, router, AppState, DiscoveryConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// A subscriber installed by the runtime takes precedence.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("frontier_map=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = DiscoveryConfig::load()?;
    let metrics = Metrics::init(&cfg)?;
    let discovery = build_discovery(&cfg)?;

    let app = router(AppState::new(discovery)).merge(metrics.router());

    Ok(app.into())
}
