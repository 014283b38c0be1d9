// src/alert/poller.rs
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::{Arc, Mutex};

use super::{AlertOutcome, AlertSession};
use crate::notify::{deliver, NotificationSink};
use crate::source::Source;

/// One alert poll: fetch, classify under the session lock, then report.
/// The lock is never held across the fetch or the notification.
pub struct AlertPoller {
    source: Arc<dyn Source>,
    sink: Arc<dyn NotificationSink>,
}

impl AlertPoller {
    pub fn new(source: Arc<dyn Source>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { source, sink }
    }

    pub async fn poll_once(&self, session: &Mutex<AlertSession>, now: DateTime<Utc>) -> AlertOutcome {
        crate::metrics::ensure_metrics_described();
        let fetched = self.source.fetch().await;

        let (outcome, note) = {
            let mut s = session.lock().expect("alert session mutex poisoned");
            let outcome = s.ingest(fetched, now);
            let note = s.notification_for(&outcome);
            (outcome, note)
        };

        counter!("alert_polls_total", "outcome" => outcome.label()).increment(1);
        match &outcome {
            AlertOutcome::Fresh(rec) => tracing::info!(
                target: "alert",
                ts = %rec.timestamp,
                directions = %rec.directions_label(),
                "fresh alert"
            ),
            AlertOutcome::NoNewAlert => tracing::debug!(target: "alert", "no new alert"),
            AlertOutcome::Failed(e) => tracing::warn!(
                target: "alert",
                kind = e.kind(),
                provider = self.source.name(),
                "alert poll failed: {e}"
            ),
        }

        if let Some(n) = note {
            deliver(self.sink.as_ref(), &n).await;
        }
        outcome
    }
}
