//! # Dashboard session
//!
//! Owns every piece of mutable state the widget used to keep in globals:
//! the alert session (freshness + 404 latch), the ticker board, the MUF
//! reading and the timer handles. Collaborators are injected: the
//! notification sink, the flag store, the upstream sources and the host's
//! `is_authorized` predicate.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::alert::{AlertOutcome, AlertPoller, AlertSession};
use crate::config::Settings;
use crate::flags::{self, FlagStore, MapGeometry};
use crate::map::{self, MapUnavailable};
use crate::muf::{MufPanel, MufReading};
use crate::notify::{deliver, Notification, NotificationSink, SEVERITY_WARNING};
use crate::scheduler::{spawn_delayed, TimerHandle};
use crate::source::{build_client, HttpSource, Source};
use crate::ticker::{TickerBoard, TickerEntry, TickerFeed, TickerOptions, TickerSlot};
use crate::update::UpdateChecker;

/// Host-supplied "is the current user allowed to control the receiver".
pub type IsAuthorized = Arc<dyn Fn() -> bool + Send + Sync>;

pub const NOT_AUTHORIZED_MESSAGE: &str = "You must be authenticated as admin to use this feature!";

/// Upstream endpoints, one per concern.
pub struct Sources {
    pub alert: Arc<dyn Source>,
    pub feed: Arc<dyn Source>,
    pub muf: Arc<dyn Source>,
    pub version: Arc<dyn Source>,
}

impl Sources {
    /// HTTP sources built from settings, sharing one client.
    pub fn http(settings: &Settings) -> Result<Self> {
        let client = build_client(settings.fetch_timeout_secs)?;
        let proxied = |name: &'static str, url: String| -> Arc<dyn Source> {
            Arc::new(
                HttpSource::new(name, url, client.clone())
                    .with_proxy(&settings.cors_proxy)
                    .with_cache_bust(&settings.domain),
            )
        };
        Ok(Self {
            alert: proxied("alert", settings.alert_url()),
            feed: proxied("ticker", settings.feed_url.clone()),
            muf: proxied("muf", settings.muf_url.clone()),
            version: Arc::new(HttpSource::new(
                "version",
                settings.version_url.clone(),
                client.clone(),
            )),
        })
    }
}

/// Panels the user can hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Muf,
    Ticker,
}

impl Panel {
    fn flag_key(self) -> &'static str {
        match self {
            Panel::Muf => flags::KEY_MUF_HIDDEN,
            Panel::Ticker => flags::KEY_TICKER_HIDDEN,
        }
    }
}

impl FromStr for Panel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "muf" | "sporadic-e" => Ok(Panel::Muf),
            "ticker" | "es-ticker" => Ok(Panel::Ticker),
            other => anyhow::bail!("unknown panel `{other}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Denied,
    Toggled { active: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertStatus {
    pub active: bool,
    pub timer_running: bool,
    pub last_shown: Option<DateTime<Utc>>,
    pub recent_alert: bool,
    pub latest_directions: Vec<f64>,
    pub not_found_reported: bool,
}

pub struct Dashboard {
    settings: Settings,
    flags: Arc<dyn FlagStore>,
    sink: Arc<dyn NotificationSink>,
    is_authorized: IsAuthorized,

    alert: Mutex<AlertSession>,
    poller: AlertPoller,
    ticker: Mutex<TickerBoard>,
    feed: TickerFeed,
    muf: MufPanel,
    update: UpdateChecker,

    alert_timer: Mutex<TimerHandle>,
    muf_timer: Mutex<TimerHandle>,
    ticker_reload_timer: Mutex<TimerHandle>,
    ticker_rotate_timer: Mutex<TimerHandle>,
}

impl Dashboard {
    pub fn new(
        settings: Settings,
        sources: Sources,
        flags: Arc<dyn FlagStore>,
        sink: Arc<dyn NotificationSink>,
        is_authorized: IsAuthorized,
    ) -> Arc<Self> {
        let opts = TickerOptions {
            max_age_minutes: settings.last_ticker_minutes,
            max_entries: settings.number_ticker_logs,
            use_local_time: settings.use_local_time,
        };
        Arc::new(Self {
            alert: Mutex::new(AlertSession::new(
                settings.last_alert_minutes,
                settings.use_local_time,
            )),
            poller: AlertPoller::new(sources.alert, sink.clone()),
            ticker: Mutex::new(TickerBoard::new()),
            feed: TickerFeed::new(sources.feed, settings.ticker_source, settings.feed_encoding, opts),
            muf: MufPanel::new(sources.muf, settings.selected_region),
            update: UpdateChecker::new(
                env!("CARGO_PKG_VERSION"),
                sources.version,
                flags.clone(),
                sink.clone(),
            ),
            alert_timer: Mutex::new(TimerHandle::new("alert-poll")),
            muf_timer: Mutex::new(TimerHandle::new("muf-poll")),
            ticker_reload_timer: Mutex::new(TimerHandle::new("ticker-reload")),
            ticker_rotate_timer: Mutex::new(TimerHandle::new("ticker-rotate")),
            settings,
            flags,
            sink,
            is_authorized,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_authorized(&self) -> bool {
        (self.is_authorized)()
    }

    /* ---------- alert ---------- */

    pub fn alerts_active(&self) -> bool {
        self.flags.get_bool(flags::KEY_ALERT_ACTIVE, true)
    }

    pub async fn poll_alert(&self, now: DateTime<Utc>) -> AlertOutcome {
        self.poller.poll_once(&self.alert, now).await
    }

    pub fn alert_status(&self, now: DateTime<Utc>) -> AlertStatus {
        let s = self.alert.lock().expect("alert session mutex poisoned");
        AlertStatus {
            active: self.alerts_active(),
            timer_running: self.alert_timer_running(),
            last_shown: s.last_shown(),
            recent_alert: s.has_recent_alert(now),
            latest_directions: s.latest_directions().to_vec(),
            not_found_reported: s.not_found_reported(),
        }
    }

    pub fn start_alert_timer(self: &Arc<Self>) -> bool {
        let me = Arc::downgrade(self);
        let period = Duration::from_secs(self.settings.alert_poll_secs);
        self.alert_timer
            .lock()
            .expect("timer mutex poisoned")
            .start(period, move || {
                let me = me.upgrade();
                async move {
                    if let Some(d) = me {
                        d.poll_alert(Utc::now()).await;
                    }
                }
            })
    }

    pub fn stop_alert_timer(&self) -> bool {
        self.alert_timer.lock().expect("timer mutex poisoned").stop()
    }

    pub fn alert_timer_running(&self) -> bool {
        self.alert_timer
            .lock()
            .expect("timer mutex poisoned")
            .is_running()
    }

    /// Flip alert polling. Requires authorization; resets freshness and the
    /// 404 latch either way.
    pub async fn toggle_alerts(self: &Arc<Self>) -> ToggleOutcome {
        if !self.is_authorized() {
            let n = Notification::new(SEVERITY_WARNING, crate::alert::ALERT_TITLE, NOT_AUTHORIZED_MESSAGE);
            deliver(self.sink.as_ref(), &n).await;
            return ToggleOutcome::Denied;
        }

        let active = !self.alerts_active();
        if let Err(e) = self.flags.set_bool(flags::KEY_ALERT_ACTIVE, active) {
            tracing::warn!(target: "alert", error = ?e, "could not persist alert flag");
        }
        self.alert
            .lock()
            .expect("alert session mutex poisoned")
            .reset();

        if active {
            self.start_alert_timer();
        } else {
            self.stop_alert_timer();
        }
        tracing::info!(target: "alert", active, "alert polling toggled");
        ToggleOutcome::Toggled { active }
    }

    /* ---------- ticker ---------- */

    pub async fn reload_ticker(&self, now: DateTime<Utc>) -> usize {
        self.feed.reload_once(&self.ticker, now).await
    }

    pub fn rotate_ticker(&self) -> TickerSlot {
        self.ticker
            .lock()
            .expect("ticker board mutex poisoned")
            .rotate()
    }

    pub fn ticker_slot(&self) -> TickerSlot {
        self.ticker
            .lock()
            .expect("ticker board mutex poisoned")
            .slot()
            .clone()
    }

    pub fn ticker_entries(&self) -> Vec<TickerEntry> {
        self.ticker
            .lock()
            .expect("ticker board mutex poisoned")
            .entries()
            .to_vec()
    }

    /* ---------- MUF ---------- */

    pub async fn update_muf(&self) -> MufReading {
        self.muf.update_once().await
    }

    pub fn muf_reading(&self) -> Option<MufReading> {
        self.muf.reading()
    }

    fn start_muf_timer(self: &Arc<Self>) -> bool {
        let me = Arc::downgrade(self);
        let period = Duration::from_secs(self.settings.muf_poll_secs);
        self.muf_timer
            .lock()
            .expect("timer mutex poisoned")
            .start(period, move || {
                let me = me.upgrade();
                async move {
                    if let Some(d) = me {
                        d.update_muf().await;
                    }
                }
            })
    }

    /* ---------- panels ---------- */

    pub fn panel_hidden(&self, panel: Panel) -> bool {
        self.flags.get_bool(panel.flag_key(), false)
    }

    /// Flip a panel's visibility; hiding the MUF panel also stops its polling.
    pub fn toggle_panel(self: &Arc<Self>, panel: Panel) -> bool {
        let hidden = !self.panel_hidden(panel);
        if let Err(e) = self.flags.set_bool(panel.flag_key(), hidden) {
            tracing::warn!(error = ?e, ?panel, "could not persist panel flag");
        }
        if panel == Panel::Muf {
            if hidden {
                self.muf_timer.lock().expect("timer mutex poisoned").stop();
            } else {
                self.start_muf_timer();
            }
        }
        hidden
    }

    /* ---------- map ---------- */

    /// The map page, or the reason it is unavailable (also sent as a notice).
    pub async fn map_document(&self, now: DateTime<Utc>) -> std::result::Result<String, MapUnavailable> {
        let (recent, directions) = {
            let s = self.alert.lock().expect("alert session mutex poisoned");
            (s.has_recent_alert(now), s.latest_directions().to_vec())
        };
        match map::check_available(recent, self.settings.qth(), &directions) {
            Ok(qth) => Ok(map::render_map_html(qth, &directions, self.settings.map_line_km)),
            Err(why) => {
                deliver(self.sink.as_ref(), &why.notification()).await;
                Err(why)
            }
        }
    }

    pub fn map_geometry(&self) -> MapGeometry {
        MapGeometry::load(self.flags.as_ref())
    }

    pub fn save_map_geometry(&self, g: &MapGeometry) -> Result<()> {
        g.save(self.flags.as_ref())
    }

    /* ---------- lifecycle ---------- */

    pub async fn check_for_update(&self, now: DateTime<Utc>) -> Option<Notification> {
        self.update.check_once(self.is_authorized(), now).await
    }

    /// Start every timer the persisted flags allow, plus the delayed update check.
    ///
    /// Timers hold only a weak reference, so dropping the last `Arc` ends them.
    pub fn start(self: &Arc<Self>) {
        if self.alerts_active() {
            self.start_alert_timer();
        }
        if !self.panel_hidden(Panel::Muf) {
            self.start_muf_timer();
        }

        let me = Arc::downgrade(self);
        self.ticker_reload_timer
            .lock()
            .expect("timer mutex poisoned")
            .start(Duration::from_secs(self.settings.ticker_refresh_secs), move || {
                let me = me.upgrade();
                async move {
                    if let Some(d) = me {
                        d.reload_ticker(Utc::now()).await;
                    }
                }
            });
        let me = Arc::downgrade(self);
        self.ticker_rotate_timer
            .lock()
            .expect("timer mutex poisoned")
            .start(Duration::from_secs(self.settings.ticker_rotate_secs), move || {
                if let Some(d) = me.upgrade() {
                    d.rotate_ticker();
                }
                async {}
            });

        let me = Arc::downgrade(self);
        spawn_delayed(
            Duration::from_millis(self.settings.update_check_delay_ms),
            async move {
                if let Some(d) = me.upgrade() {
                    d.check_for_update(Utc::now()).await;
                }
            },
        );
    }

    /// Stop every timer.
    pub fn shutdown(&self) {
        for t in [
            &self.alert_timer,
            &self.muf_timer,
            &self.ticker_reload_timer,
            &self.ticker_rotate_timer,
        ] {
            t.lock().expect("timer mutex poisoned").stop();
        }
    }
}
