use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{Notification, NotificationSink};

/// Posts `{"text": ...}` to a chat webhook (Slack/Mattermost compatible).
pub struct WebhookNotifier {
    url: String,
    client: Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .map(Self::new)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// Plain-text rendering: `<br>` becomes a newline, other tags are dropped.
pub(crate) fn render_text(n: &Notification) -> String {
    let body = n.body.replace("<br>", "\n");
    let body = crate::ticker::strip_tags(&body);
    format!("*{}* [{}]\n{}", n.title, n.severity, body)
}

#[async_trait::async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        let body = serde_json::json!({ "text": render_text(n) });

        self.client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("webhook post")?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_text_flattens_markup() {
        let n = Notification::new("warning", "ES-Alert", "Update available:<br>1.3 → 1.4");
        assert_eq!(
            render_text(&n),
            "*ES-Alert* [warning]\nUpdate available:\n1.3 → 1.4"
        );
    }
}
