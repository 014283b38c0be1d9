// tests/dashboard.rs
//
// Session-level behavior: authorization gate, toggles, map availability and
// panel flags, with every collaborator injected.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use es_alert::config::Settings;
use es_alert::dashboard::{Dashboard, Panel, Sources, ToggleOutcome, NOT_AUTHORIZED_MESSAGE};
use es_alert::flags::{FlagStore, MapGeometry, MemoryFlagStore, KEY_ALERT_ACTIVE};
use es_alert::map::MapUnavailable;
use es_alert::notify::RecordingSink;
use es_alert::source::FixtureSource;

const ALERT_JSON: &str =
    r#"{"esalert":{"esdatetime":"2025-06-01 13:00:00","directions":[66, "77", 88]}}"#;
const MUF_JSON: &str = r#"{
  "europe": {"max_frequency": "104", "last_log": "2025-06-01 12:58"},
  "north_america": {"max_frequency": "No data", "last_log": "No data"},
  "australia": {"max_frequency": "88", "last_log": "2025-06-01 03:10"}
}"#;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 13, 5, 0).unwrap()
}

fn settings(qth: Option<(f64, f64)>) -> Settings {
    Settings {
        qth_latitude: qth.map(|q| q.0),
        qth_longitude: qth.map(|q| q.1),
        ..Settings::default()
    }
}

fn sources() -> Sources {
    Sources {
        alert: Arc::new(FixtureSource::ok("alert", ALERT_JSON)),
        feed: Arc::new(FixtureSource::ok("ticker", "<table></table>")),
        muf: Arc::new(FixtureSource::ok("muf", MUF_JSON)),
        version: Arc::new(FixtureSource::ok("version", "const PLUGIN_VERSION = '1.0';")),
    }
}

fn dashboard(
    qth: Option<(f64, f64)>,
    authorized: bool,
) -> (Arc<Dashboard>, Arc<MemoryFlagStore>, Arc<RecordingSink>) {
    let flags = Arc::new(MemoryFlagStore::new());
    let sink = Arc::new(RecordingSink::new());
    let d = Dashboard::new(
        settings(qth),
        sources(),
        flags.clone(),
        sink.clone(),
        Arc::new(move || authorized),
    );
    (d, flags, sink)
}

#[tokio::test]
async fn unauthorized_toggle_is_denied_and_reported() {
    let (d, flags, sink) = dashboard(None, false);

    assert_eq!(d.toggle_alerts().await, ToggleOutcome::Denied);
    let notes = sink.take();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].body, NOT_AUTHORIZED_MESSAGE);
    assert!(flags.get(KEY_ALERT_ACTIVE).is_none(), "nothing persisted");
    assert!(d.alerts_active());
}

#[tokio::test]
async fn toggle_resets_session_and_drives_the_timer() {
    let (d, flags, sink) = dashboard(None, true);

    d.poll_alert(now()).await;
    assert!(d.alert_status(now()).last_shown.is_some());
    sink.take();

    assert_eq!(d.toggle_alerts().await, ToggleOutcome::Toggled { active: false });
    assert_eq!(flags.get(KEY_ALERT_ACTIVE).as_deref(), Some("false"));
    let status = d.alert_status(now());
    assert!(!status.active);
    assert!(!status.timer_running);
    assert!(status.last_shown.is_none(), "freshness cleared");

    assert_eq!(d.toggle_alerts().await, ToggleOutcome::Toggled { active: true });
    assert!(d.alert_timer_running());
    assert!(!d.start_alert_timer(), "start is idempotent");

    d.shutdown();
    assert!(!d.alert_timer_running());
}

#[tokio::test]
async fn map_requires_recent_alert_qth_and_directions() {
    let (d, _, sink) = dashboard(None, true);
    assert_eq!(d.map_document(now()).await, Err(MapUnavailable::NoRecentAlert));
    assert_eq!(sink.take().len(), 1);

    d.poll_alert(now()).await;
    sink.take();
    assert_eq!(d.map_document(now()).await, Err(MapUnavailable::QthMissing));
    assert_eq!(sink.take()[0].body, "QTH coordinates missing.");

    let (d, _, _) = dashboard(Some((52.52, 13.40)), true);
    d.poll_alert(now()).await;
    let html = d.map_document(now()).await.expect("map available");
    assert_eq!(html.matches("L.polyline(").count(), 3);
    assert!(html.contains("Azimuth 77°"));
}

#[tokio::test]
async fn muf_reading_for_configured_region() {
    let (d, _, _) = dashboard(None, false);
    assert!(d.muf_reading().is_none());

    let r = d.update_muf().await;
    assert_eq!(r.region, "EU");
    assert_eq!(r.display, "up to 104 MHz");
    assert_eq!(r.title.as_deref(), Some("Last updated: 2025-06-01 12:58"));
    assert_eq!(d.muf_reading(), Some(r));
}

#[tokio::test]
async fn panel_flags_persist() {
    let (d, flags, _) = dashboard(None, false);

    assert!(!d.panel_hidden(Panel::Muf));
    assert!(d.toggle_panel("muf".parse().unwrap()));
    assert!(d.panel_hidden(Panel::Muf));
    assert_eq!(flags.get("sporadicEEnabled").as_deref(), Some("true"));

    assert!(d.toggle_panel(Panel::Ticker));
    assert!(!d.toggle_panel(Panel::Ticker));
    assert!("clock".parse::<Panel>().is_err());
}

#[tokio::test]
async fn map_geometry_round_trips_through_flags() {
    let (d, _, _) = dashboard(None, false);
    assert_eq!(d.map_geometry(), MapGeometry::default());

    let g = MapGeometry {
        x: 40,
        y: 60,
        width: 800,
        height: 500,
    };
    d.save_map_geometry(&g).unwrap();
    assert_eq!(d.map_geometry(), g);
}

#[tokio::test]
async fn update_check_needs_authorization() {
    let (d, _, sink) = dashboard(None, false);
    assert!(d.check_for_update(now()).await.is_none());
    assert!(sink.is_empty());

    // the running crate is newer than the published 1.0
    let (d, _, sink) = dashboard(None, true);
    assert!(d.check_for_update(now()).await.is_none());
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn running_timers_do_not_keep_the_dashboard_alive() {
    let (d, _, _) = dashboard(None, true);
    d.start();
    assert!(d.alert_timer_running());
    assert_eq!(Arc::strong_count(&d), 1, "timers hold no strong reference");

    let weak = Arc::downgrade(&d);
    drop(d);
    assert!(weak.upgrade().is_none());
}
