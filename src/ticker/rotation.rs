// src/ticker/rotation.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::TickerEntry;

pub const NO_ENTRIES_PLACEHOLDER: &str = "No log entries available.";
pub const LOADING_PLACEHOLDER: &str = "Loading logs…";

/// Index into the last loaded list, advanced once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rotation {
    index: usize,
}

impl Rotation {
    /// Entry to show on this tick, then advance. `None` for an empty list.
    pub fn next<'a>(&mut self, entries: &'a [TickerEntry]) -> Option<&'a TickerEntry> {
        if entries.is_empty() {
            return None;
        }
        let i = self.index % entries.len();
        self.index = (i + 1) % entries.len();
        entries.get(i)
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// What the ticker slot currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerSlot {
    pub text: String,
    pub link: Option<String>,
}

impl TickerSlot {
    fn placeholder(text: &str) -> Self {
        Self {
            text: text.to_string(),
            link: None,
        }
    }
}

/// Cached entry list plus the rotating display slot.
#[derive(Debug, Clone)]
pub struct TickerBoard {
    entries: Vec<TickerEntry>,
    rotation: Rotation,
    slot: TickerSlot,
    loaded_at: Option<DateTime<Utc>>,
}

impl Default for TickerBoard {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            rotation: Rotation::default(),
            slot: TickerSlot::placeholder(LOADING_PLACEHOLDER),
            loaded_at: None,
        }
    }
}

impl TickerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly parsed list; rotation restarts at the top.
    pub fn replace(&mut self, entries: Vec<TickerEntry>, now: DateTime<Utc>) {
        self.entries = entries;
        self.rotation.reset();
        self.loaded_at = Some(now);
    }

    /// One rotation tick.
    pub fn rotate(&mut self) -> TickerSlot {
        self.slot = match self.rotation.next(&self.entries) {
            Some(e) => TickerSlot {
                text: e.headline(),
                link: e.link.clone(),
            },
            None => TickerSlot::placeholder(NO_ENTRIES_PLACEHOLDER),
        };
        self.slot.clone()
    }

    pub fn slot(&self) -> &TickerSlot {
        &self.slot
    }

    pub fn entries(&self) -> &[TickerEntry] {
        &self.entries
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}
