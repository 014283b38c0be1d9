//! One-shot probe: polls the alert endpoint, the log feed and the MUF summary
//! once with the configured settings and prints what the dashboard would show.

use std::sync::Arc;

use chrono::Utc;
use es_alert::config::load_settings_default;
use es_alert::dashboard::{Dashboard, Sources};
use es_alert::flags::MemoryFlagStore;
use es_alert::notify::LogSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let settings = load_settings_default()?;
    let sources = Sources::http(&settings)?;
    let d = Dashboard::new(
        settings,
        sources,
        Arc::new(MemoryFlagStore::new()),
        Arc::new(LogSink),
        Arc::new(|| false),
    );

    let now = Utc::now();
    let outcome = d.poll_alert(now).await;
    println!("alert: {}", outcome.label());

    let n = d.reload_ticker(now).await;
    println!("ticker: {n} entries");
    for e in d.ticker_entries() {
        println!("  {}", e.headline());
    }

    let muf = d.update_muf().await;
    println!("muf {}: {}", muf.region, muf.display);

    println!("feed-probe done");
    Ok(())
}
