use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("alert_polls_total", "Alert polls, labelled by outcome.");
        describe_counter!("notifications_total", "Notifications handed to the sink.");
        describe_counter!("ticker_entries_kept_total", "Ticker entries kept after filtering.");
        describe_counter!(
            "ticker_entries_dropped_total",
            "Ticker items dropped, labelled by reason."
        );
        describe_counter!("ticker_reload_errors_total", "Ticker feed fetch/parse errors.");
        describe_histogram!("ticker_parse_ms", "Ticker feed parse time in milliseconds.");
        describe_gauge!("ticker_last_reload_ts", "Unix ts of the last ticker reload.");
        describe_gauge!("alert_poll_interval_secs", "Configured alert poll interval.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and expose the configured poll interval.
    pub fn init(alert_poll_secs: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        gauge!("alert_poll_interval_secs").set(alert_poll_secs as f64);
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
