//! Settings loading and management

use super::schema::Settings;
use super::validate::validate_settings;
use crate::utils::{atomic_write, expand_tilde};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// File name of the settings file inside the config directory
pub const SETTINGS_FILE: &str = "settings.json";

const ENV_PREFIX: &str = "CHATDESK__";

/// Settings loader
pub struct SettingsLoader {
    config_dir: PathBuf,
}

impl SettingsLoader {
    /// Create a new loader with the default config directory (`~/.chatdesk`)
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".chatdesk"))
            .unwrap_or_else(|| PathBuf::from(".chatdesk"));

        Self { config_dir }
    }

    /// Create a new loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load settings from file and environment.
    ///
    /// Missing keys fall back to defaults; a missing file means all defaults.
    pub fn load(&self) -> crate::Result<Settings> {
        let settings_path = self.settings_path();
        let mut merged = serde_json::to_value(Settings::default())?;

        if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            let file_value: Value = serde_json::from_str(&content)?;
            merge_values(&mut merged, file_value);
        }

        apply_path_overrides(&mut merged);

        let settings: Settings = serde_json::from_value(merged)?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults plus environment overrides
    /// when the file cannot be read or fails validation. The error that
    /// caused the fallback is returned alongside so callers can report it.
    pub fn load_or_default(&self) -> (Settings, Option<crate::Error>) {
        match self.load() {
            Ok(settings) => (settings, None),
            Err(e) => (defaults_with_env(), Some(e)),
        }
    }

    /// Save settings to file, replacing it wholesale
    pub fn save(&self, settings: &Settings) -> crate::Result<()> {
        validate_settings(settings)?;
        let content = serde_json::to_string_pretty(settings)?;
        atomic_write(self.settings_path(), content.as_bytes())?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of `settings.json`
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Directory that receives log files
    pub fn log_dir(&self, settings: &Settings) -> PathBuf {
        if settings.logging.dir.trim().is_empty() {
            self.config_dir.join("logs")
        } else {
            expand_tilde(settings.logging.dir.trim())
        }
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Defaults with environment overrides applied. Overrides that would make
/// the result invalid are ignored.
fn defaults_with_env() -> Settings {
    let defaults = Settings::default();
    let Ok(mut merged) = serde_json::to_value(&defaults) else {
        return defaults;
    };
    apply_path_overrides(&mut merged);
    match serde_json::from_value::<Settings>(merged) {
        Ok(settings) if validate_settings(&settings).is_ok() => settings,
        _ => defaults,
    }
}

/// Return a copy of `settings` with one dotted key (e.g. `ollama.timeout_secs`)
/// replaced by `raw`, parsed the same way as environment overrides.
pub fn set_key(settings: &Settings, key: &str, raw: &str) -> crate::Result<Settings> {
    let mut value = serde_json::to_value(settings)?;
    let path: Vec<String> = key
        .split('.')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect();

    let existing = lookup(&value, &path)
        .ok_or_else(|| crate::Error::Config(format!("unknown setting '{}'", key)))?;
    let parsed = coerce_value(Some(existing), raw);
    set_path_value(&mut value, &path, parsed);

    let updated: Settings = serde_json::from_value(value)?;
    validate_settings(&updated)?;
    Ok(updated)
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Value::Number(v.into());
    }
    if let Ok(v) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(v) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// String-typed keys keep the raw text so a model named `7` stays a string.
fn coerce_value(existing: Option<&Value>, raw: &str) -> Value {
    match existing {
        Some(Value::String(_)) => Value::String(raw.to_string()),
        _ => parse_env_value(raw),
    }
}

fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = root;
    for segment in path {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn set_path_value(root: &mut Value, path: &[String], value: Value) {
    if path.is_empty() {
        *root = value;
        return;
    }

    let mut current = root;
    for segment in &path[..path.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        map.insert(path[path.len() - 1].clone(), value);
    }
}

fn apply_path_overrides(config: &mut Value) {
    for (key, value) in std::env::vars() {
        let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = suffix
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        let parsed = coerce_value(lookup(config, &segments), &value);
        set_path_value(config, &segments, parsed);
    }
}
