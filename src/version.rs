//! # Version comparison
//!
//! Orders dotted/alphanumeric version strings such as `1.4`, `1.3b` or
//! `2.0rc1`. A version is split into runs of digits and runs of letters;
//! everything else is a separator and is dropped.
//!
//! - Digit runs compare numerically (`1.10 > 1.9`), at any length.
//! - Letter runs compare lexicographically, case-insensitive.
//! - A number always ranks below a letter run at the same position.
//! - A missing segment counts as `0`, so `1.0 == 1` and `"" == "0"`.

use std::cmp::Ordering;

/// One segment of a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Decimal digits without leading zeros; zero is `"0"`.
    Num(String),
    Alpha(String),
}

impl Segment {
    fn cmp_segment(&self, other: &Segment) -> Ordering {
        match (self, other) {
            // Digit runs of any length: longer is larger, then digit by digit.
            (Segment::Num(a), Segment::Num(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Segment::Alpha(a), Segment::Alpha(b)) => a.cmp(b),
            (Segment::Num(_), Segment::Alpha(_)) => Ordering::Less,
            (Segment::Alpha(_), Segment::Num(_)) => Ordering::Greater,
        }
    }
}

/// Parsed version, used only for pairwise ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTuple {
    segments: Vec<Segment>,
}

impl VersionTuple {
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut digits = String::new();
        let mut letters = String::new();

        for ch in raw.chars() {
            if ch.is_ascii_digit() {
                flush_alpha(&mut letters, &mut segments);
                digits.push(ch);
            } else if ch.is_ascii_alphabetic() {
                flush_num(&mut digits, &mut segments);
                letters.push(ch.to_ascii_lowercase());
            } else {
                flush_num(&mut digits, &mut segments);
                flush_alpha(&mut letters, &mut segments);
            }
        }
        flush_num(&mut digits, &mut segments);
        flush_alpha(&mut letters, &mut segments);

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

fn flush_num(buf: &mut String, out: &mut Vec<Segment>) {
    if buf.is_empty() {
        return;
    }
    let trimmed = buf.trim_start_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };
    out.push(Segment::Num(digits.to_string()));
    buf.clear();
}

fn flush_alpha(buf: &mut String, out: &mut Vec<Segment>) {
    if buf.is_empty() {
        return;
    }
    out.push(Segment::Alpha(std::mem::take(buf)));
}

impl Ord for VersionTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Segment::Num("0".to_string());
        let len = self.segments.len().max(other.segments.len()).max(1);
        for i in 0..len {
            let a = self.segments.get(i).unwrap_or(&zero);
            let b = other.segments.get(i).unwrap_or(&zero);
            match a.cmp_segment(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for VersionTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two version strings: `-1` if `a < b`, `0` if equal, `1` if `a > b`.
pub fn compare(a: &str, b: &str) -> i8 {
    match VersionTuple::parse(a).cmp(&VersionTuple::parse(b)) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}
