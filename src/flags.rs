//! # Flag store
//!
//! String key/value pairs that survive restarts: on/off toggles, the last
//! update-notification time and the map window geometry. Nothing else is
//! persisted.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const KEY_ALERT_ACTIVE: &str = "ESAlertActive";
pub const KEY_MUF_HIDDEN: &str = "sporadicEEnabled";
pub const KEY_TICKER_HIDDEN: &str = "esTickerEnabled";
pub const KEY_MAP_POS_X: &str = "ESMapPosX";
pub const KEY_MAP_POS_Y: &str = "ESMapPosY";
pub const KEY_MAP_WIDTH: &str = "ESMapWidth";
pub const KEY_MAP_HEIGHT: &str = "ESMapHeight";

pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(default)
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, if value { "true" } else { "false" })
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse::<i64>().ok())
    }
}

/// Process-local store; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .expect("flag store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .expect("flag store mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileFlagStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, String>>,
}

impl JsonFileFlagStore {
    /// Open (or lazily create) the store at `path`. A missing or unreadable
    /// file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "flag store unreadable, starting empty");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing flags to {}", self.path.display()))
    }
}

impl FlagStore for JsonFileFlagStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache
            .lock()
            .expect("flag store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.cache.lock().expect("flag store mutex poisoned");
        map.insert(key.to_string(), value.to_string());
        self.persist(&map)
    }
}

/// Last known map window position and inner size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MapGeometry {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Default for MapGeometry {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 600,
            height: 600,
        }
    }
}

impl MapGeometry {
    /// Missing or zero values fall back to the defaults, field by field.
    pub fn load(store: &dyn FlagStore) -> Self {
        let d = Self::default();
        let pick = |key: &str, fallback: i64| {
            store
                .get_i64(key)
                .filter(|v| *v != 0)
                .unwrap_or(fallback)
        };
        Self {
            x: pick(KEY_MAP_POS_X, d.x),
            y: pick(KEY_MAP_POS_Y, d.y),
            width: pick(KEY_MAP_WIDTH, d.width),
            height: pick(KEY_MAP_HEIGHT, d.height),
        }
    }

    pub fn save(&self, store: &dyn FlagStore) -> Result<()> {
        store.set(KEY_MAP_POS_X, &self.x.to_string())?;
        store.set(KEY_MAP_POS_Y, &self.y.to_string())?;
        store.set(KEY_MAP_WIDTH, &self.width.to_string())?;
        store.set(KEY_MAP_HEIGHT, &self.height.to_string())?;
        Ok(())
    }
}
