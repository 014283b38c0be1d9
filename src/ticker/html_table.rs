// src/ticker/html_table.rs
//! FMLIST log feed as an HTML table. Only `<tr valign="top">` rows carry
//! log entries; columns are fixed:
//!
//! | idx | content                                 |
//! |-----|-----------------------------------------|
//! | 0   | UTC time (`HH:MM` or `HHMM`)            |
//! | 1   | frequency, MHz                          |
//! | 2   | ITU country code                        |
//! | 3   | station; an `<a href>` gives the link   |
//! | 4   | reception info (receiver, QTH, distance)|
//!
//! Rows have no date; the normalizer anchors them to the current UTC day.

use once_cell::sync::OnceCell;
use regex::Regex;

use super::{clean_cell, RawTickerItem};

const COL_TIME: usize = 0;
const COL_FREQ: usize = 1;
const COL_ITU: usize = 2;
const COL_STATION: usize = 3;
const COL_RECEPTION: usize = 4;

fn re_row() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<tr\b[^>]*\bvalign\s*=\s*["']?top["']?[^>]*>(.*?)</tr>"#)
            .expect("row regex")
    })
}

fn re_cell() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("cell regex"))
}

fn re_href() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*\bhref\s*=\s*["']([^"']+)["']"#).expect("href regex")
    })
}

/// Extract raw items; rows with too few cells yield empty (dropped) items.
pub fn extract_items(html: &str) -> Vec<RawTickerItem> {
    re_row()
        .captures_iter(html)
        .map(|row| {
            let cells: Vec<&str> = re_cell()
                .captures_iter(&row[1])
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            let cell = |i: usize| cells.get(i).map(|c| clean_cell(c)).unwrap_or_default();
            let link = cells.get(COL_STATION).and_then(|c| {
                re_href()
                    .captures(c)
                    .map(|h| html_escape::decode_html_entities(&h[1]).to_string())
            });

            RawTickerItem {
                date: None,
                time: cell(COL_TIME),
                frequency: cell(COL_FREQ),
                country_code: cell(COL_ITU),
                sender: cell(COL_STATION),
                reception: cells.get(COL_RECEPTION).map(|c| c.to_string()).unwrap_or_default(),
                link,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_top_aligned_rows_are_items() {
        let html = r#"
<table>
<tr><th>Time</th><th>MHz</th></tr>
<tr valign="top"><td>13:12</td><td>89.60</td><td>I</td>
<td><a href="https://www.fmlist.org/s?id=1&amp;x=2">RAI&nbsp;Radio 1</a></td><td>DK1ABC (JO31) 1234 km</td></tr>
<tr valign="top"><td>13:10</td><td>88.1</td></tr>
</table>"#;
        let items = extract_items(html);
        assert_eq!(items.len(), 2);
        let a = &items[0];
        assert_eq!(a.time, "13:12");
        assert_eq!(a.frequency, "89.60");
        assert_eq!(a.country_code, "I");
        assert_eq!(a.sender, "RAI Radio 1");
        assert_eq!(a.reception, "DK1ABC (JO31) 1234 km");
        assert_eq!(a.link.as_deref(), Some("https://www.fmlist.org/s?id=1&x=2"));
        assert!(items[1].reception.is_empty());
    }
}
