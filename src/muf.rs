//! # MUF panel
//!
//! Sporadic-E maximum usable frequency per region, as published by the
//! fmdx.org summary endpoint:
//!
//! ```json
//! { "europe": { "max_frequency": "104", "last_log": "2025-06-01 13:12" }, ... }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};

use crate::source::Source;

pub const NO_DATA: &str = "No data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "NA")]
    Na,
    #[serde(rename = "AU")]
    Au,
}

impl Region {
    /// Key in the upstream JSON.
    pub fn key(self) -> &'static str {
        match self {
            Region::Eu => "europe",
            Region::Na => "north_america",
            Region::Au => "australia",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Region::Eu => "EU",
            Region::Na => "NA",
            Region::Au => "AU",
        }
    }
}

/// Panel state after one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MufReading {
    pub region: &'static str,
    /// `"up to 104 MHz"`, `"❌"` when no data, `"Error"` on failure.
    pub display: String,
    /// Tooltip; absent when the feed has no last-log time.
    pub title: Option<String>,
}

impl MufReading {
    pub fn error(region: Region) -> Self {
        Self {
            region: region.label(),
            display: "Error".to_string(),
            title: None,
        }
    }
}

fn field(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the panel text for `region` from the summary body.
pub fn parse_muf(body: &str, region: Region) -> Result<MufReading> {
    let json: Value = serde_json::from_str(body).context("parsing muf json")?;
    let data = json
        .get(region.key())
        .with_context(|| format!("muf summary has no `{}` section", region.key()))?;

    let display = match field(data, "max_frequency") {
        Some(f) if f != NO_DATA && !f.is_empty() => format!("up to {f} MHz"),
        _ => "❌".to_string(),
    };
    let title = field(data, "last_log")
        .filter(|l| l != NO_DATA && !l.is_empty())
        .map(|l| format!("Last updated: {l}"));

    Ok(MufReading {
        region: region.label(),
        display,
        title,
    })
}

/// Polls the summary and keeps the latest reading.
pub struct MufPanel {
    source: Arc<dyn Source>,
    region: Region,
    reading: RwLock<Option<MufReading>>,
}

impl MufPanel {
    pub fn new(source: Arc<dyn Source>, region: Region) -> Self {
        Self {
            source,
            region,
            reading: RwLock::new(None),
        }
    }

    pub fn reading(&self) -> Option<MufReading> {
        self.reading.read().expect("muf rwlock poisoned").clone()
    }

    async fn fetch_reading(&self) -> Result<MufReading> {
        let resp = self.source.fetch().await?;
        if !resp.is_success() {
            anyhow::bail!("muf endpoint returned {} {}", resp.status, resp.reason);
        }
        parse_muf(&resp.text(), self.region)
    }

    pub async fn update_once(&self) -> MufReading {
        let reading = match self.fetch_reading().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "muf", error = ?e, "MUF request failed");
                MufReading::error(self.region)
            }
        };
        *self.reading.write().expect("muf rwlock poisoned") = Some(reading.clone());
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FixtureSource;

    #[test]
    fn reading_with_data() {
        let body = r#"{"europe":{"max_frequency":"104","last_log":"2025-06-01 13:12"},
                       "north_america":{"max_frequency":"No data","last_log":"No data"}}"#;
        let eu = parse_muf(body, Region::Eu).unwrap();
        assert_eq!(eu.display, "up to 104 MHz");
        assert_eq!(eu.title.as_deref(), Some("Last updated: 2025-06-01 13:12"));

        let na = parse_muf(body, Region::Na).unwrap();
        assert_eq!(na.display, "❌");
        assert_eq!(na.title, None);

        assert!(parse_muf(body, Region::Au).is_err());
    }

    #[tokio::test]
    async fn failures_show_error() {
        let panel = MufPanel::new(Arc::new(FixtureSource::status("muf", 500)), Region::Eu);
        let r = panel.update_once().await;
        assert_eq!(r, MufReading::error(Region::Eu));
        assert_eq!(panel.reading(), Some(r));
    }
}
