//! Notification sinks: where alert, update and map messages end up.
//!
//! The core only talks to [`NotificationSink`]. The binary wires a
//! [`NotifierMux`] that always logs and optionally posts to a webhook.

pub mod webhook;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::Serialize;

pub use webhook::WebhookNotifier;

/// Severity tags understood by the dashboard toast renderer.
pub const SEVERITY_WARNING: &str = "warning";
pub const SEVERITY_ERROR: &str = "error";
pub const SEVERITY_ALERT: &str = "warning important";

/// One user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Space-separated tag combination, e.g. `"warning important"`.
    pub severity: String,
    pub title: String,
    /// May carry light markup (`<br>`).
    pub body: String,
    /// Keep on screen until dismissed.
    pub persistent: bool,
    /// Suppress sound (or the sink's equivalent).
    pub silent: bool,
}

impl Notification {
    pub fn new(severity: &str, title: &str, body: impl Into<String>) -> Self {
        Self {
            severity: severity.to_string(),
            title: title.to_string(),
            body: body.into(),
            persistent: false,
            silent: false,
        }
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.severity.split_whitespace().any(|t| t == tag)
    }
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, n: &Notification) -> Result<()>;
}

/// Deliver through a sink; failures are logged and swallowed.
pub async fn deliver(sink: &dyn NotificationSink, n: &Notification) {
    metrics::counter!("notifications_total").increment(1);
    if let Err(e) = sink.notify(n).await {
        tracing::warn!(error = ?e, title = %n.title, "notification delivery failed");
    }
}

/// Writes notifications to the tracing log.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, n: &Notification) -> Result<()> {
        if n.has_tag(SEVERITY_ERROR) {
            tracing::error!(target: "notify", title = %n.title, severity = %n.severity, "{}", n.body);
        } else {
            tracing::warn!(target: "notify", title = %n.title, severity = %n.severity, "{}", n.body);
        }
        Ok(())
    }
}

/// Fan-out to the log plus any configured remote channel.
pub struct NotifierMux {
    log: LogSink,
    webhook: Option<WebhookNotifier>,
}

impl NotifierMux {
    pub fn new(webhook: Option<WebhookNotifier>) -> Self {
        Self {
            log: LogSink,
            webhook,
        }
    }

    /// Webhook enabled iff `NOTIFY_WEBHOOK_URL` is set.
    pub fn from_env() -> Self {
        Self::new(WebhookNotifier::from_env())
    }
}

#[async_trait::async_trait]
impl NotificationSink for NotifierMux {
    async fn notify(&self, n: &Notification) -> Result<()> {
        self.log.notify(n).await?;
        if let Some(w) = &self.webhook {
            w.notify(n).await?;
        }
        Ok(())
    }
}

/// Keeps every notification in memory; used by tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock().expect("recording sink poisoned"))
    }

    pub fn len(&self) -> usize {
        self.seen.lock().expect("recording sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, n: &Notification) -> Result<()> {
        self.seen
            .lock()
            .expect("recording sink poisoned")
            .push(n.clone());
        Ok(())
    }
}
