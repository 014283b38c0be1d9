//! Published-version check, shown to authorized users at most once a day.

use anyhow::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::Arc;

use crate::flags::FlagStore;
use crate::notify::{deliver, Notification, NotificationSink, SEVERITY_WARNING};
use crate::source::Source;
use crate::version;

pub const PLUGIN_NAME: &str = "ES-Alert";
pub const KEY_LAST_UPDATE_NOTIFICATION: &str = "ES-Alert_lastUpdateNotification";

const ONE_DAY_MS: i64 = 86_400_000;

/// First `PLUGIN_VERSION = '1.4'` or `version = "1.4"` in `text`.
/// A declaration without a value reads as `"0"`.
pub fn extract_remote_version(text: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?im)(?:const\s+PLUGIN_VERSION|^\s*version)\s*=\s*['"]([\d.]+[a-z]*)?['"]"#)
            .expect("version regex")
    });
    re.captures(text).map(|c| {
        c.get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "0".to_string())
    })
}

/// True (and the timestamp stored) when the last notice is older than a day.
pub fn should_show_update_notice(store: &dyn FlagStore, now: DateTime<Utc>) -> Result<bool> {
    let now_ms = now.timestamp_millis();
    let last = store.get_i64(KEY_LAST_UPDATE_NOTIFICATION).unwrap_or(0);
    if now_ms - last > ONE_DAY_MS {
        store.set(KEY_LAST_UPDATE_NOTIFICATION, &now_ms.to_string())?;
        return Ok(true);
    }
    Ok(false)
}

pub struct UpdateChecker {
    local_version: String,
    source: Arc<dyn Source>,
    flags: Arc<dyn FlagStore>,
    sink: Arc<dyn NotificationSink>,
}

impl UpdateChecker {
    pub fn new(
        local_version: impl Into<String>,
        source: Arc<dyn Source>,
        flags: Arc<dyn FlagStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            local_version: local_version.into(),
            source,
            flags,
            sink,
        }
    }

    async fn remote_version(&self) -> Result<Option<String>> {
        let resp = self.source.fetch().await?;
        if !resp.is_success() {
            anyhow::bail!("version source returned {} {}", resp.status, resp.reason);
        }
        Ok(extract_remote_version(&resp.text()))
    }

    /// Returns the notification sent, if any. Failures are only logged.
    pub async fn check_once(&self, authorized: bool, now: DateTime<Utc>) -> Option<Notification> {
        if !authorized {
            return None;
        }
        let remote = match self.remote_version().await {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(target: "update", error = ?e, "{PLUGIN_NAME}: version check failed");
                return None;
            }
        };
        if version::compare(&self.local_version, &remote) != -1 {
            tracing::debug!(target: "update", local = %self.local_version, %remote, "up to date");
            return None;
        }
        match should_show_update_notice(self.flags.as_ref(), now) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::warn!(target: "update", error = ?e, "could not store update notice time");
                return None;
            }
        }
        let n = Notification::new(
            SEVERITY_WARNING,
            PLUGIN_NAME,
            format!("Update available:<br>{} → {}", self.local_version, remote),
        );
        deliver(self.sink.as_ref(), &n).await;
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::MemoryFlagStore;
    use crate::notify::RecordingSink;
    use crate::source::FixtureSource;
    use chrono::{Duration, TimeZone};

    #[test]
    fn extracts_both_declaration_styles() {
        assert_eq!(
            extract_remote_version("  const PLUGIN_VERSION     = '1.4b';"),
            Some("1.4b".into())
        );
        assert_eq!(
            extract_remote_version("[package]\nname = \"x\"\nversion = \"2.0\"\n"),
            Some("2.0".into())
        );
        assert_eq!(extract_remote_version("const PLUGIN_VERSION = '';"), Some("0".into()));
        assert_eq!(extract_remote_version("nothing here"), None);
    }

    #[test]
    fn notice_throttled_to_once_per_day() {
        let store = MemoryFlagStore::new();
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert!(should_show_update_notice(&store, t0).unwrap());
        assert!(!should_show_update_notice(&store, t0 + Duration::hours(23)).unwrap());
        assert!(should_show_update_notice(&store, t0 + Duration::hours(25)).unwrap());
    }

    #[tokio::test]
    async fn newer_remote_notifies_authorized_only() {
        let sink = Arc::new(RecordingSink::new());
        let checker = UpdateChecker::new(
            "1.3",
            Arc::new(FixtureSource::ok("version", "const PLUGIN_VERSION = '1.4';")),
            Arc::new(MemoryFlagStore::new()),
            sink.clone(),
        );
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        assert!(checker.check_once(false, now).await.is_none());
        let n = checker.check_once(true, now).await.unwrap();
        assert_eq!(n.body, "Update available:<br>1.3 → 1.4");
        // same day: throttled
        assert!(checker.check_once(true, now).await.is_none());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn same_or_older_remote_is_silent() {
        let sink = Arc::new(RecordingSink::new());
        let checker = UpdateChecker::new(
            "1.4",
            Arc::new(FixtureSource::ok("version", "version = \"1.3b\"")),
            Arc::new(MemoryFlagStore::new()),
            sink.clone(),
        );
        assert!(checker.check_once(true, Utc::now()).await.is_none());
        assert!(sink.is_empty());
    }
}
