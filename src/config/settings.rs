// src/config/settings.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::muf::Region;
use crate::ticker::{FeedEncoding, TickerSourceKind};

const ENV_PATH: &str = "ES_ALERT_CONFIG";
const ENV_OMID: &str = "ES_ALERT_OMID";
const ENV_AUTHORIZED: &str = "ES_ALERT_AUTHORIZED";

/// Runtime options. Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// FMLIST receiver id used in the alert URL.
    pub omid: String,
    /// Alert freshness window, minutes.
    pub last_alert_minutes: i64,
    /// Ticker age window, minutes.
    pub last_ticker_minutes: i64,
    /// Entries kept per ticker reload.
    pub number_ticker_logs: usize,
    /// Local wall-clock vs `HH:MM UTC` display.
    pub use_local_time: bool,
    pub selected_region: Region,

    /// `{omid}` is substituted.
    pub alert_url_template: String,
    pub feed_url: String,
    pub ticker_source: TickerSourceKind,
    pub feed_encoding: FeedEncoding,
    pub muf_url: String,
    /// Prepended to every outgoing URL when non-empty.
    pub cors_proxy: String,
    /// Reported to the upstream APIs as `domain=`.
    pub domain: String,
    /// Remote text carrying the published version.
    pub version_url: String,

    pub alert_poll_secs: u64,
    pub ticker_refresh_secs: u64,
    pub ticker_rotate_secs: u64,
    pub muf_poll_secs: u64,
    pub update_check_delay_ms: u64,
    /// Per-request timeout; 0 leaves the transport default in place.
    pub fetch_timeout_secs: u64,

    pub qth_latitude: Option<f64>,
    pub qth_longitude: Option<f64>,
    /// Length of each direction line on the map.
    pub map_line_km: f64,

    pub flags_path: PathBuf,
    /// Stand-in for the host page's login state.
    pub authorized: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            omid: "1234".to_string(),
            last_alert_minutes: 15,
            last_ticker_minutes: 15,
            number_ticker_logs: 5,
            use_local_time: true,
            selected_region: Region::Eu,
            alert_url_template: "https://www.fmlist.org/esapi/es{omid}.json".to_string(),
            feed_url: "http://www.fmlist.org/logfeed.php?band=Es".to_string(),
            ticker_source: TickerSourceKind::Rss,
            feed_encoding: FeedEncoding::Latin1,
            muf_url: "https://fmdx.org/includes/tools/get_muf.php".to_string(),
            cors_proxy: String::new(),
            domain: "localhost".to_string(),
            version_url:
                "https://raw.githubusercontent.com/highpoint2000/ES-Alert/main/ES-Alert/es-alert.js"
                    .to_string(),
            alert_poll_secs: 60,
            ticker_refresh_secs: 60,
            ticker_rotate_secs: 3,
            muf_poll_secs: 60,
            update_check_delay_ms: 2_500,
            fetch_timeout_secs: 20,
            qth_latitude: None,
            qth_longitude: None,
            map_line_km: 2000.0,
            flags_path: PathBuf::from("state/flags.json"),
            authorized: false,
        }
    }
}

impl Settings {
    pub fn alert_url(&self) -> String {
        self.alert_url_template.replace("{omid}", self.omid.trim())
    }

    pub fn qth(&self) -> Option<(f64, f64)> {
        match (self.qth_latitude, self.qth_longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// Zero intervals and empty windows fall back to defaults.
    fn sanitize(mut self) -> Self {
        let d = Settings::default();
        if self.alert_poll_secs == 0 {
            self.alert_poll_secs = d.alert_poll_secs;
        }
        if self.ticker_refresh_secs == 0 {
            self.ticker_refresh_secs = d.ticker_refresh_secs;
        }
        if self.ticker_rotate_secs == 0 {
            self.ticker_rotate_secs = d.ticker_rotate_secs;
        }
        if self.muf_poll_secs == 0 {
            self.muf_poll_secs = d.muf_poll_secs;
        }
        if self.last_alert_minutes < 0 {
            self.last_alert_minutes = d.last_alert_minutes;
        }
        if self.last_ticker_minutes < 0 {
            self.last_ticker_minutes = d.last_ticker_minutes;
        }
        if self.number_ticker_logs == 0 {
            self.number_ticker_logs = d.number_ticker_logs;
        }
        if !(self.map_line_km.is_finite() && self.map_line_km > 0.0) {
            self.map_line_km = d.map_line_km;
        }
        self
    }

    fn apply_env(mut self) -> Self {
        if let Ok(omid) = std::env::var(ENV_OMID) {
            if !omid.trim().is_empty() {
                self.omid = omid.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var(ENV_AUTHORIZED) {
            self.authorized = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        self
    }
}

/// Load settings from an explicit path. TOML or JSON, chosen by extension.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let parsed = parse_settings(&content, &ext)
        .with_context(|| format!("parsing settings from {}", path.display()))?;
    Ok(parsed.sanitize().apply_env())
}

/// Load settings using env var + fallbacks:
/// 1) $ES_ALERT_CONFIG
/// 2) config/es_alert.toml
/// 3) config/es_alert.json
/// 4) built-in defaults
pub fn load_settings_default() -> Result<Settings> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_settings_from(&pb);
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path"));
    }
    for candidate in ["config/es_alert.toml", "config/es_alert.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_settings_from(&pb);
        }
    }
    Ok(Settings::default().apply_env())
}

fn parse_settings(s: &str, hint_ext: &str) -> Result<Settings> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        _ => toml::from_str(s)
            .or_else(|_| serde_json::from_str(s))
            .map_err(|_| anyhow!("unsupported settings format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn partial_toml_keeps_defaults() {
        let s = parse_settings(
            r#"
omid = "9876"
use_local_time = false
ticker_source = "html_table"
selected_region = "NA"
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(s.omid, "9876");
        assert!(!s.use_local_time);
        assert_eq!(s.ticker_source, TickerSourceKind::HtmlTable);
        assert_eq!(s.selected_region, Region::Na);
        assert_eq!(s.last_alert_minutes, 15);
        assert_eq!(s.alert_url(), "https://www.fmlist.org/esapi/es9876.json");
    }

    #[test]
    fn zero_intervals_fall_back() {
        let s = parse_settings(r#"{"alert_poll_secs": 0, "number_ticker_logs": 0}"#, "json")
            .unwrap()
            .sanitize();
        assert_eq!(s.alert_poll_secs, 60);
        assert_eq!(s.number_ticker_logs, 5);
    }

    #[test]
    fn qth_requires_both_coordinates() {
        let mut s = Settings::default();
        assert_eq!(s.qth(), None);
        s.qth_latitude = Some(52.0);
        assert_eq!(s.qth(), None);
        s.qth_longitude = Some(13.0);
        assert_eq!(s.qth(), Some((52.0, 13.0)));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);
        env::remove_var(ENV_OMID);

        let s = load_settings_default().unwrap();
        assert_eq!(s, Settings::default().apply_env());

        let p = tmp.path().join("custom.json");
        fs::write(&p, r#"{"omid": "42"}"#).unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        assert_eq!(load_settings_default().unwrap().omid, "42");
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
