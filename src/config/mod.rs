// src/config/mod.rs
pub mod settings;

pub use settings::{load_settings_default, load_settings_from, Settings};
