//! ES Alert service: binary entrypoint.
//! Boots the Axum HTTP server, starts the dashboard timers and mounts /metrics.

use std::sync::Arc;

use es_alert::config::load_settings_default;
use es_alert::dashboard::{Dashboard, IsAuthorized, Sources};
use es_alert::flags::JsonFileFlagStore;
use es_alert::metrics::Metrics;
use es_alert::notify::NotifierMux;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Per-area targets used by the library's log lines.
const DEFAULT_LOG_FILTER: &str =
    "es_alert=info,alert=info,ticker=info,muf=info,update=info,scheduler=info,notify=info,warn";

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    // The runtime may already have installed a subscriber.
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already set");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = load_settings_default()?;
    tracing::info!(
        omid = %settings.omid,
        region = settings.selected_region.label(),
        ticker = ?settings.ticker_source,
        "settings loaded"
    );

    let metrics = Metrics::init(settings.alert_poll_secs)?;
    let flags = Arc::new(JsonFileFlagStore::open(settings.flags_path.clone()));
    let sink = Arc::new(NotifierMux::from_env());
    let sources = Sources::http(&settings)?;

    let authorized = settings.authorized;
    let is_authorized: IsAuthorized = Arc::new(move || authorized);

    let dashboard = Dashboard::new(settings, sources, flags, sink, is_authorized);
    dashboard.start();

    let router = es_alert::api::router(dashboard).merge(metrics.router());
    Ok(router.into())
}
