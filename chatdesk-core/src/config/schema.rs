//! Settings schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default model selected on first start
pub const DEFAULT_MODEL: &str = "llama2-uncensored";

/// Default generation endpoint base
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/api";

/// User settings, stored as `settings.json`
///
/// The top-level keys match the files written by earlier desktop versions,
/// so those files load unchanged. Keys this version does not know are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Transcript font size (8-24)
    #[serde(default = "default_font_size")]
    pub font_size: u8,
    /// Mirror transcripts into `save_directory`
    #[serde(default = "default_true")]
    pub auto_save: bool,
    /// Directory for auto-saved transcripts; empty disables mirroring
    #[serde(default)]
    pub save_directory: String,
    /// Dark color scheme
    #[serde(default)]
    pub dark_mode: bool,
    /// Model used for new prompts
    #[serde(default = "default_model")]
    pub model: String,
    /// Model server configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_font_size() -> u8 {
    12
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            auto_save: true,
            save_directory: String::new(),
            dark_mode: false,
            model: default_model(),
            ollama: OllamaConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Model server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// API base; `/generate` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on one generation request, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Model management executable
    #[serde(default = "default_program")]
    pub program: String,
    /// Upper bound on `list`, in seconds
    #[serde(default = "default_list_timeout")]
    pub list_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_program() -> String {
    "ollama".to_string()
}
fn default_list_timeout() -> u64 {
    10
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            program: default_program(),
            list_timeout_secs: default_list_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files; empty means `<config dir>/logs`
    #[serde(default)]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: String::new(),
            overrides: HashMap::new(),
        }
    }
}
