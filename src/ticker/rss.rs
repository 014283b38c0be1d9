// src/ticker/rss.rs
//! FMLIST log feed as RSS. Each `<description>` reads like
//! `DK1ABC (JO31) logged in I RAI Radio 1 on 89.60 MHz via Es on 2025-06-01 at 1312 UTC`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use super::{cleanup_text, RawTickerItem};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    link: Option<String>,
    description: Option<String>,
}

fn re_logged_at() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bon\s+(\d{4})-(\d{2})-(\d{2})\s+at\s+(\d{2,4})\s+UTC")
            .expect("logged-at regex")
    })
}

fn re_body() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<rx>.+?)\s+logged\s+in\s+(?P<cc>[a-z]{1,4})\s+(?P<station>.+?)\s+on\s+(?P<freq>\d{2,3}(?:[.,]\d{1,3})?)\s*MHz$",
        )
        .expect("rss body regex")
    })
}

/// Split one description into raw fields. Missing pieces stay empty and the
/// normalizer drops the item.
pub fn parse_description(desc: &str, link: Option<String>) -> RawTickerItem {
    let mut raw = RawTickerItem {
        link,
        ..RawTickerItem::default()
    };

    if let Some(c) = re_logged_at().captures(desc) {
        let ymd = (c[1].parse::<i32>(), c[2].parse::<u32>(), c[3].parse::<u32>());
        if let (Ok(y), Ok(m), Ok(d)) = ymd {
            raw.date = NaiveDate::from_ymd_opt(y, m, d);
        }
        raw.time = c[4].to_string();
    }
    // No explicit date: the item is unusable, not "today".
    if raw.date.is_none() {
        raw.time.clear();
    }

    let body = cleanup_text(desc);
    if let Some(c) = re_body().captures(&body) {
        raw.reception = c["rx"].to_string();
        raw.country_code = c["cc"].to_string();
        raw.sender = c["station"].to_string();
        raw.frequency = c["freq"].to_string();
    }
    raw
}

/// Extract raw items from an RSS document.
pub fn extract_items(xml: &str) -> Result<Vec<RawTickerItem>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing ticker rss xml")?;

    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| {
            let desc = it.description.unwrap_or_default();
            let link = it.link.map(|l| l.trim().to_string());
            parse_description(desc.trim(), link)
        })
        .collect())
}

/// Turn HTML named entities into characters so the XML parser only sees the
/// five predefined ones. Unknown names are escaped and survive as text.
fn scrub_html_entities_for_xml(s: &str) -> String {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("entity regex"));
    re.replace_all(s, |c: &regex::Captures| {
        let name = &c[1];
        if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
            return c[0].to_string();
        }
        let decoded = html_escape::decode_html_entities(&c[0]);
        if decoded == c[0] {
            format!("&amp;{name};")
        } else {
            decoded.into_owned()
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_fields() {
        let raw = parse_description(
            "DK1ABC (JO31) logged in I RAI Radio 1 on 89.60 MHz via Es on 2025-06-01 at 1312 UTC",
            Some("https://www.fmlist.org/x".into()),
        );
        assert_eq!(raw.date, NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(raw.time, "1312");
        assert_eq!(raw.reception, "DK1ABC (JO31)");
        assert_eq!(raw.country_code, "I");
        assert_eq!(raw.sender, "RAI Radio 1");
        assert_eq!(raw.frequency, "89.60");
    }

    #[test]
    fn description_without_date_has_no_time() {
        let raw = parse_description("DK1ABC logged in I RAI Radio 1 on 89.60 MHz", None);
        assert!(raw.time.is_empty());
        assert_eq!(raw.sender, "RAI Radio 1");
    }

    #[test]
    fn html_entities_become_text() {
        assert_eq!(
            scrub_html_entities_for_xml("Radio Cl&eacute;a &amp; Co&nbsp;&bogus; &#233;"),
            "Radio Cléa &amp; Co\u{a0}&amp;bogus; &#233;"
        );
    }

    #[test]
    fn empty_channel_is_ok() {
        let items = extract_items(r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#)
            .unwrap();
        assert!(items.is_empty());
    }
}
