// src/lib.rs
// Public library surface for the binary, the probe tool and integration tests.

pub mod alert;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod flags;
pub mod geo;
pub mod map;
pub mod metrics;
pub mod muf;
pub mod notify;
pub mod scheduler;
pub mod source;
pub mod ticker;
pub mod update;
pub mod version;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::{load_settings_default, Settings};
pub use crate::dashboard::{Dashboard, IsAuthorized, Sources};
pub use crate::notify::{Notification, NotificationSink, NotifierMux};
