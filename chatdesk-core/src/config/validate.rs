//! Settings validation rules.

use super::schema::Settings;

pub const MIN_FONT_SIZE: u8 = 8;
pub const MAX_FONT_SIZE: u8 = 24;

/// Validate settings and return aggregated validation errors.
pub fn validate_settings(settings: &Settings) -> crate::Result<()> {
    let mut errors = Vec::new();

    if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&settings.font_size) {
        errors.push(format!(
            "font_size must be in [{}, {}]",
            MIN_FONT_SIZE, MAX_FONT_SIZE
        ));
    }

    let base_url = settings.ollama.base_url.trim();
    if base_url.is_empty() {
        errors.push("ollama.base_url must not be empty".to_string());
    } else if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        errors.push("ollama.base_url must start with http:// or https://".to_string());
    }
    if settings.ollama.timeout_secs == 0 {
        errors.push("ollama.timeout_secs must be > 0".to_string());
    }
    if settings.ollama.list_timeout_secs == 0 {
        errors.push("ollama.list_timeout_secs must be > 0".to_string());
    }
    if settings.ollama.program.trim().is_empty() {
        errors.push("ollama.program must not be empty".to_string());
    }

    let format = settings.logging.format.to_ascii_lowercase();
    if format != "text" && format != "json" {
        errors.push("logging.format must be 'text' or 'json'".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_settings(&Settings::default()).unwrap();
    }

    #[test]
    fn test_validate_font_size_bounds() {
        let mut settings = Settings::default();
        settings.font_size = 8;
        validate_settings(&settings).unwrap();
        settings.font_size = 24;
        validate_settings(&settings).unwrap();

        settings.font_size = 25;
        let err = validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("font_size"));
        settings.font_size = 7;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut settings = Settings::default();
        settings.ollama.base_url = "localhost:11434".to_string();
        settings.ollama.timeout_secs = 0;
        settings.logging.format = "xml".to_string();

        let msg = validate_settings(&settings).unwrap_err().to_string();
        assert!(msg.contains("ollama.base_url"));
        assert!(msg.contains("ollama.timeout_secs"));
        assert!(msg.contains("logging.format"));
    }
}
