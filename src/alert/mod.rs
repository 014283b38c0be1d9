// src/alert/mod.rs
//! # Sporadic-E alert normalization
//!
//! Turns one poll of the alert endpoint into an [`AlertOutcome`]:
//!
//! - 404 means "nothing published for this receiver" and is reported once
//!   per active session (latched).
//! - Other non-2xx statuses, bodies that are not JSON, and transport
//!   failures are reported on every occurrence.
//! - A record is fresh when it is at most `max_age_minutes` old and its
//!   timestamp differs from the last one shown.
//!
//! Nothing here returns an error to the caller; every failure is a value.

pub mod poller;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::notify::{Notification, SEVERITY_ALERT, SEVERITY_ERROR, SEVERITY_WARNING};
use crate::source::RawResponse;

pub use poller::AlertPoller;

pub const ALERT_TITLE: &str = "ES Alert";

/// One parsed alert: when it was generated and which bearings might work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub directions: Vec<f64>,
}

impl AlertRecord {
    /// Directions joined by single spaces, e.g. `"66 77 88"`.
    pub fn directions_label(&self) -> String {
        join_directions(&self.directions)
    }
}

pub fn join_directions(dirs: &[f64]) -> String {
    dirs.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Why a poll produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    NotFound,
    Http { status: u16, reason: String },
    InvalidData,
    Transport(String),
}

impl AlertError {
    pub fn kind(&self) -> &'static str {
        match self {
            AlertError::NotFound => "not_found",
            AlertError::Http { .. } => "http_error",
            AlertError::InvalidData => "invalid_data",
            AlertError::Transport(_) => "transport_error",
        }
    }
}

impl fmt::Display for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertError::NotFound => write!(f, "No information for this OMID."),
            AlertError::Http { status, reason } => write!(f, "HTTP error: {status} {reason}"),
            AlertError::InvalidData => write!(f, "Invalid alert data."),
            AlertError::Transport(msg) => write!(f, "Network or parse error: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    NoNewAlert,
    Fresh(AlertRecord),
    Failed(AlertError),
}

impl AlertOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AlertOutcome::NoNewAlert => "no_new_alert",
            AlertOutcome::Fresh(_) => "fresh",
            AlertOutcome::Failed(e) => e.kind(),
        }
    }
}

/// Accepts RFC 3339, ISO-8601 with minute precision or fractional seconds,
/// with an offset, a trailing `Z` or nothing (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f%#z",
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%dT%H:%M%#z",
        "%Y-%m-%d %H:%M%#z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s);
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(n) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(n.and_utc());
        }
    }
    None
}

/// `"10, 20,30"` → `[10, 20, 30]`; empty and non-numeric tokens are dropped.
pub fn parse_direction_list(s: &str) -> Vec<f64> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .collect()
}

fn direction_from_value(v: &Value) -> Option<f64> {
    let d = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    d.filter(|d| d.is_finite())
}

/// Native list or comma string; anything else is an empty sequence.
pub fn normalize_directions(v: Option<&Value>) -> Vec<f64> {
    match v {
        Some(Value::Array(items)) => items.iter().filter_map(direction_from_value).collect(),
        Some(Value::String(s)) => parse_direction_list(s),
        Some(n @ Value::Number(_)) => direction_from_value(n).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Parse `{ esalert: { esdatetime, directions } }`.
pub fn parse_alert_record(body: &str) -> Result<AlertRecord, AlertError> {
    let json: Value =
        serde_json::from_str(body.trim()).map_err(|e| AlertError::Transport(e.to_string()))?;
    let alert = json.get("esalert").ok_or(AlertError::InvalidData)?;
    let timestamp = alert
        .get("esdatetime")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .ok_or(AlertError::InvalidData)?;
    Ok(AlertRecord {
        timestamp,
        directions: normalize_directions(alert.get("directions")),
    })
}

/// Last alert timestamp that was surfaced to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreshnessState {
    last_shown: Option<DateTime<Utc>>,
}

impl FreshnessState {
    pub fn last_shown(&self) -> Option<DateTime<Utc>> {
        self.last_shown
    }

    /// Fresh iff within the window and not the timestamp already shown.
    pub fn is_fresh(&self, ts: DateTime<Utc>, now: DateTime<Utc>, max_age_minutes: i64) -> bool {
        let age_minutes = (now - ts).num_milliseconds() as f64 / 60_000.0;
        age_minutes <= max_age_minutes as f64 && self.last_shown != Some(ts)
    }

    fn mark_shown(&mut self, ts: DateTime<Utc>) {
        self.last_shown = Some(ts);
    }
}

/// Per-activation alert state: freshness, the 404 latch and the last
/// directions seen (for the map).
#[derive(Debug, Clone)]
pub struct AlertSession {
    max_age_minutes: i64,
    use_local_time: bool,
    freshness: FreshnessState,
    not_found_reported: bool,
    latest_directions: Vec<f64>,
}

impl AlertSession {
    pub fn new(max_age_minutes: i64, use_local_time: bool) -> Self {
        Self {
            max_age_minutes,
            use_local_time,
            freshness: FreshnessState::default(),
            not_found_reported: false,
            latest_directions: Vec::new(),
        }
    }

    pub fn max_age_minutes(&self) -> i64 {
        self.max_age_minutes
    }

    pub fn last_shown(&self) -> Option<DateTime<Utc>> {
        self.freshness.last_shown()
    }

    pub fn latest_directions(&self) -> &[f64] {
        &self.latest_directions
    }

    pub fn not_found_reported(&self) -> bool {
        self.not_found_reported
    }

    /// An alert was shown within the freshness window.
    pub fn has_recent_alert(&self, now: DateTime<Utc>) -> bool {
        match self.last_shown() {
            Some(ts) => (now - ts).num_milliseconds() as f64 / 60_000.0 <= self.max_age_minutes as f64,
            None => false,
        }
    }

    /// Feature toggled: forget what was shown and re-arm the 404 latch.
    pub fn reset(&mut self) {
        self.freshness = FreshnessState::default();
        self.not_found_reported = false;
    }

    /// Classify one fetch result. Marks the record shown when fresh.
    pub fn ingest(
        &mut self,
        fetched: anyhow::Result<RawResponse>,
        now: DateTime<Utc>,
    ) -> AlertOutcome {
        let resp = match fetched {
            Ok(r) => r,
            Err(e) => return AlertOutcome::Failed(AlertError::Transport(format!("{e:#}"))),
        };
        if resp.status == 404 {
            return AlertOutcome::Failed(AlertError::NotFound);
        }
        if !resp.is_success() {
            return AlertOutcome::Failed(AlertError::Http {
                status: resp.status,
                reason: resp.reason,
            });
        }
        let record = match parse_alert_record(&resp.text()) {
            Ok(r) => r,
            Err(e) => return AlertOutcome::Failed(e),
        };
        self.latest_directions = record.directions.clone();

        if self
            .freshness
            .is_fresh(record.timestamp, now, self.max_age_minutes)
        {
            self.freshness.mark_shown(record.timestamp);
            AlertOutcome::Fresh(record)
        } else {
            AlertOutcome::NoNewAlert
        }
    }

    /// What to tell the user about `outcome`, if anything. Sets the 404 latch.
    pub fn notification_for(&mut self, outcome: &AlertOutcome) -> Option<Notification> {
        match outcome {
            AlertOutcome::NoNewAlert => None,
            AlertOutcome::Fresh(rec) => Some(
                Notification::new(
                    SEVERITY_ALERT,
                    ALERT_TITLE,
                    format!(
                        "The following directions might work: {}. This Alert has been generated at {}",
                        rec.directions_label(),
                        self.format_timestamp(rec.timestamp)
                    ),
                )
                .persistent(),
            ),
            AlertOutcome::Failed(AlertError::NotFound) => {
                if self.not_found_reported {
                    return None;
                }
                self.not_found_reported = true;
                Some(Notification::new(
                    SEVERITY_WARNING,
                    ALERT_TITLE,
                    AlertError::NotFound.to_string(),
                ))
            }
            AlertOutcome::Failed(e) => {
                Some(Notification::new(SEVERITY_ERROR, ALERT_TITLE, e.to_string()))
            }
        }
    }

    pub fn format_timestamp(&self, ts: DateTime<Utc>) -> String {
        if self.use_local_time {
            ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
        } else {
            ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
        }
    }
}
