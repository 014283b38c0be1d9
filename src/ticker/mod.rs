// src/ticker/mod.rs
//! # Log ticker
//!
//! Normalizes the FMLIST Es log feed (RSS or HTML table) into a short list of
//! recent [`TickerEntry`] records and rotates them through one display slot.
//!
//! Pipeline per reload:
//!   1. provider extracts raw items (fields by position / pattern)
//!   2. incomplete items are dropped silently
//!   3. compact times are anchored to a date and aged against `now`
//!   4. items older than the window are dropped, duplicates removed
//!   5. newest first, truncated to `max_entries`

pub mod html_table;
pub mod rotation;
pub mod rss;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use metrics::{counter, gauge, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::source::Source;

pub use rotation::{Rotation, TickerBoard, TickerSlot, NO_ENTRIES_PLACEHOLDER};

/// Which document shape the feed URL serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickerSourceKind {
    Rss,
    HtmlTable,
}

/// Byte encoding of the feed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedEncoding {
    #[serde(rename = "iso-8859-1", alias = "latin1")]
    Latin1,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

pub fn decode_body(bytes: &[u8], enc: FeedEncoding) -> String {
    match enc {
        // ISO-8859-1 maps every byte to the code point of the same value.
        FeedEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        FeedEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerOptions {
    pub max_age_minutes: i64,
    pub max_entries: usize,
    pub use_local_time: bool,
}

/// One item as extracted from the document, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTickerItem {
    /// Explicit UTC date, when the source carries one.
    pub date: Option<NaiveDate>,
    /// `HH:MM`, `HMM` or `HHMM`.
    pub time: String,
    pub frequency: String,
    pub sender: String,
    pub country_code: String,
    pub reception: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerEntry {
    pub display_time: String,
    pub entry_time: DateTime<Utc>,
    pub age_minutes: i64,
    pub frequency: String,
    pub sender_label: String,
    pub country_code: String,
    pub reception_info: String,
    pub link: Option<String>,
}

impl TickerEntry {
    /// `"13:12 UTC - DK1ABC (JO31) logged in RAI Radio 1 on 89.60 MHz (I)"`
    pub fn headline(&self) -> String {
        let mut line = format!(
            "{} - {} logged in {} on {} MHz",
            self.display_time, self.reception_info, self.sender_label, self.frequency
        );
        if !self.country_code.is_empty() {
            line.push_str(&format!(" ({})", self.country_code));
        }
        line
    }
}

/// Counts of what a normalization pass threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickerStats {
    pub incomplete: usize,
    pub stale: usize,
    pub duplicates: usize,
}

fn re(cell: &'static OnceCell<Regex>, pat: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pat).expect("ticker regex"))
}

/// Remove markup tags, keep text and line breaks.
pub fn strip_tags(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    re(&RE_TAGS, r"(?is)</?[a-z][^>]*>")
        .replace_all(s, "")
        .to_string()
}

/// Entity decode, tag strip, whitespace collapse.
pub fn clean_cell(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let out = strip_tags(s);
    let out = html_escape::decode_html_entities(&out).to_string();
    re(&RE_WS, r"\s+").replace_all(&out, " ").trim().to_string()
}

/// Presentation cleanup: drop the ` via Es` qualifier, the
/// ` on YYYY-MM-DD at HHMM UTC` clause and numeric codes like `(#1234)`.
pub fn cleanup_text(s: &str) -> String {
    static RE_VIA: OnceCell<Regex> = OnceCell::new();
    static RE_ON_DATE: OnceCell<Regex> = OnceCell::new();
    static RE_CODE: OnceCell<Regex> = OnceCell::new();

    let out = clean_cell(s);
    let out = re(&RE_VIA, r"(?i)\s*\bvia\s+Es\b").replace_all(&out, "");
    let out = re(&RE_ON_DATE, r"(?i)\s*\bon\s+\d{4}-\d{2}-\d{2}\s+at\s+\d{2,4}\s+UTC\b")
        .replace_all(&out, "");
    let out = re(&RE_CODE, r"\s*\(#?\d+\)").replace_all(&out, "");
    out.trim().to_string()
}

/// `"13:12"`, `"1312"`, `"912"` → `(h, m)`; `None` when out of range.
pub fn parse_compact_time(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    let (h, m) = if let Some((h, m)) = s.split_once(':') {
        (h, m)
    } else if s.len() == 3 || s.len() == 4 {
        s.split_at(s.len() - 2)
    } else {
        return None;
    };
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some((h, m))
}

/// `"89,6"` → `"89.6"`; `None` unless it is a positive decimal number.
pub fn normalize_frequency(s: &str) -> Option<String> {
    let f = s.trim().trim_end_matches("MHz").trim().replace(',', ".");
    match f.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Some(f),
        _ => None,
    }
}

/// Validate, age-filter, dedup, sort newest first and truncate.
///
/// Items without an explicit date are anchored to `now`'s UTC calendar date.
/// An item logged just before midnight and read just after therefore reads
/// as a time later today (age clamps to 0). That gap comes from the feed
/// format and is kept as is.
pub fn normalize_items(
    items: Vec<RawTickerItem>,
    now: DateTime<Utc>,
    opts: &TickerOptions,
) -> (Vec<TickerEntry>, TickerStats) {
    let mut stats = TickerStats::default();
    let mut seen: HashSet<(DateTime<Utc>, String, String, String)> = HashSet::new();
    let mut out = Vec::with_capacity(items.len());

    for it in items {
        let sender = clean_cell(&it.sender);
        let reception = cleanup_text(&it.reception);
        let (Some((h, m)), Some(frequency)) =
            (parse_compact_time(&it.time), normalize_frequency(&it.frequency))
        else {
            stats.incomplete += 1;
            continue;
        };
        if sender.is_empty() || reception.is_empty() {
            stats.incomplete += 1;
            continue;
        }

        let date = it.date.unwrap_or_else(|| now.date_naive());
        let Some(naive) = date.and_hms_opt(h, m, 0) else {
            stats.incomplete += 1;
            continue;
        };
        let entry_time = naive.and_utc();

        let age_minutes = (now - entry_time).num_milliseconds().div_euclid(60_000);
        if age_minutes > opts.max_age_minutes {
            stats.stale += 1;
            continue;
        }

        if !seen.insert((entry_time, frequency.clone(), sender.clone(), reception.clone())) {
            stats.duplicates += 1;
            continue;
        }

        let display_time = if opts.use_local_time {
            entry_time.with_timezone(&Local).format("%H:%M").to_string()
        } else {
            format!("{h:02}:{m:02} UTC")
        };

        out.push(TickerEntry {
            display_time,
            entry_time,
            age_minutes: age_minutes.max(0),
            frequency,
            sender_label: sender,
            country_code: clean_cell(&it.country_code).to_ascii_uppercase(),
            reception_info: reception,
            link: it.link.filter(|l| !l.trim().is_empty()),
        });
    }

    // Stable: feed order breaks ties.
    out.sort_by(|a, b| b.entry_time.cmp(&a.entry_time));
    out.truncate(opts.max_entries);
    (out, stats)
}

/// Parse one feed document of the given shape.
pub fn parse_feed(
    kind: TickerSourceKind,
    doc: &str,
    now: DateTime<Utc>,
    opts: &TickerOptions,
) -> Result<(Vec<TickerEntry>, TickerStats)> {
    crate::metrics::ensure_metrics_described();
    let t0 = std::time::Instant::now();

    let items = match kind {
        TickerSourceKind::Rss => rss::extract_items(doc)?,
        TickerSourceKind::HtmlTable => html_table::extract_items(doc),
    };
    let (entries, stats) = normalize_items(items, now, opts);

    histogram!("ticker_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("ticker_entries_kept_total").increment(entries.len() as u64);
    counter!("ticker_entries_dropped_total", "reason" => "incomplete")
        .increment(stats.incomplete as u64);
    counter!("ticker_entries_dropped_total", "reason" => "stale").increment(stats.stale as u64);
    counter!("ticker_entries_dropped_total", "reason" => "duplicate")
        .increment(stats.duplicates as u64);
    Ok((entries, stats))
}

/// Fetches and parses the feed, then swaps the board's list.
pub struct TickerFeed {
    source: Arc<dyn Source>,
    kind: TickerSourceKind,
    encoding: FeedEncoding,
    opts: TickerOptions,
}

impl TickerFeed {
    pub fn new(
        source: Arc<dyn Source>,
        kind: TickerSourceKind,
        encoding: FeedEncoding,
        opts: TickerOptions,
    ) -> Self {
        Self {
            source,
            kind,
            encoding,
            opts,
        }
    }

    async fn fetch_entries(&self, now: DateTime<Utc>) -> Result<Vec<TickerEntry>> {
        let resp = self.source.fetch().await?;
        if !resp.is_success() {
            anyhow::bail!("ticker feed returned {} {}", resp.status, resp.reason);
        }
        let doc = decode_body(&resp.body, self.encoding);
        let (entries, stats) = parse_feed(self.kind, &doc, now, &self.opts)?;
        tracing::debug!(
            target: "ticker",
            kept = entries.len(),
            incomplete = stats.incomplete,
            stale = stats.stale,
            duplicates = stats.duplicates,
            "ticker feed parsed"
        );
        Ok(entries)
    }

    /// A failed reload empties the board, like an empty feed would.
    pub async fn reload_once(&self, board: &Mutex<TickerBoard>, now: DateTime<Utc>) -> usize {
        let entries = match self.fetch_entries(now).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ticker", error = ?e, provider = self.source.name(), "failed to load feed");
                counter!("ticker_reload_errors_total").increment(1);
                Vec::new()
            }
        };
        let n = entries.len();
        board
            .lock()
            .expect("ticker board mutex poisoned")
            .replace(entries, now);
        gauge!("ticker_last_reload_ts").set(now.timestamp() as f64);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn opts() -> TickerOptions {
        TickerOptions {
            max_age_minutes: 15,
            max_entries: 5,
            use_local_time: false,
        }
    }

    fn item(time: &str) -> RawTickerItem {
        RawTickerItem {
            date: None,
            time: time.into(),
            frequency: "89.6".into(),
            sender: "RAI Radio 1".into(),
            country_code: "i".into(),
            reception: "DK1ABC (JO31)".into(),
            link: None,
        }
    }

    #[test]
    fn compact_times() {
        assert_eq!(parse_compact_time("13:12"), Some((13, 12)));
        assert_eq!(parse_compact_time("1312"), Some((13, 12)));
        assert_eq!(parse_compact_time("912"), Some((9, 12)));
        assert_eq!(parse_compact_time("9:05"), Some((9, 5)));
        assert_eq!(parse_compact_time("2460"), None);
        assert_eq!(parse_compact_time("12"), None);
        assert_eq!(parse_compact_time("ab:cd"), None);
    }

    #[test]
    fn age_boundary_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 13, 30, 0).unwrap();
        let (kept, stats) = normalize_items(vec![item("1315"), item("1314")], now, &opts());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].age_minutes, 15);
        assert_eq!(stats.stale, 1);
    }

    #[test]
    fn partial_minutes_are_floored() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 13, 30, 59).unwrap();
        let (kept, _) = normalize_items(vec![item("1315")], now, &opts());
        assert_eq!(kept[0].age_minutes, 15);
    }

    #[test]
    fn incomplete_items_are_dropped() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 13, 30, 0).unwrap();
        let mut no_freq = item("1320");
        no_freq.frequency = " ".into();
        let mut no_rx = item("1320");
        no_rx.reception = "".into();
        let mut no_sender = item("1320");
        no_sender.sender = "<b></b>".into();
        let (kept, stats) = normalize_items(vec![no_freq, no_rx, no_sender, item("")], now, &opts());
        assert!(kept.is_empty());
        assert_eq!(stats.incomplete, 4);
    }

    #[test]
    fn duplicates_sorted_and_truncated() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 13, 30, 0).unwrap();
        let items = vec![
            item("1320"),
            item("1325"),
            item("1320"),
            item("1321"),
            item("1322"),
            item("1323"),
            item("1324"),
        ];
        let (kept, stats) = normalize_items(items, now, &opts());
        assert_eq!(stats.duplicates, 1);
        assert_eq!(kept.len(), 5);
        let times: Vec<_> = kept.iter().map(|e| e.display_time.as_str()).collect();
        assert_eq!(
            times,
            vec!["13:25 UTC", "13:24 UTC", "13:23 UTC", "13:22 UTC", "13:21 UTC"]
        );
    }

    #[test]
    fn midnight_gap_is_preserved() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 5, 0).unwrap();
        // yesterday's 23:58 is anchored to today and reads as a future time
        let (kept, _) = normalize_items(vec![item("2358")], now, &opts());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].age_minutes, 0);
        assert!(kept[0].entry_time > now);

        let (kept, _) = normalize_items(vec![item("0010")], now, &opts());
        assert_eq!(kept[0].entry_time, now + Duration::minutes(5));
    }

    #[test]
    fn headline_and_cleanup() {
        assert_eq!(
            cleanup_text("DK1ABC (JO31) (#4711) via Es on 2025-06-01 at 1312 UTC"),
            "DK1ABC (JO31)"
        );
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 13, 20, 0).unwrap();
        let (kept, _) = normalize_items(vec![item("1312")], now, &opts());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].age_minutes, 8);
        assert_eq!(
            kept[0].headline(),
            "13:12 UTC - DK1ABC (JO31) logged in RAI Radio 1 on 89.6 MHz (I)"
        );

        let mut no_code = kept[0].clone();
        no_code.country_code.clear();
        assert_eq!(
            no_code.headline(),
            "13:12 UTC - DK1ABC (JO31) logged in RAI Radio 1 on 89.6 MHz"
        );
    }

    #[test]
    fn latin1_decoding() {
        let bytes = b"K\xf6ln";
        assert_eq!(decode_body(bytes, FeedEncoding::Latin1), "Köln");
    }
}
