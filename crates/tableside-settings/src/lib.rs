//! # tableside-settings
//!
//! Layered configuration for the Tableside live order board.
//!
//! Precedence, lowest to highest: compiled defaults, `~/.tableside/settings.json`,
//! `TABLESIDE_*` environment variables.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{ApiSettings, LoggingSettings, RealtimeSettings, TablesideSettings, TransportKind};
