//! Settings management
//!
//! Handles loading, validation and saving of chatdesk settings from
//! `settings.json` and `CHATDESK__*` environment variables.

pub mod loader;
pub mod schema;
pub mod validate;

pub use loader::{set_key, SettingsLoader, SETTINGS_FILE};
pub use schema::*;
pub use validate::validate_settings;
