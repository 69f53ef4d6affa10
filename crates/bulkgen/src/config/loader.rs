use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const MAX_WORKERS: usize = 32;
pub const MAX_RETRIES: u32 = 10;

/// Loads a config file, choosing the format from its extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("json") => load_config_from_str(&content),
        Some("yaml") | Some("yml") => {
            let config: Config = serde_yaml::from_str(&content)?;
            validate_config(&config)?;
            Ok(config)
        }
        _ => Err(ConfigError::UnsupportedExtension(path.to_path_buf())),
    }
}

/// Parses and validates a JSON config document.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let scheduler = &config.scheduler;
    if scheduler.worker_count == 0 || scheduler.worker_count > MAX_WORKERS {
        return Err(invalid(format!(
            "scheduler.workerCount must be between 1 and {}, got {}",
            MAX_WORKERS, scheduler.worker_count
        )));
    }
    if scheduler.max_retries > MAX_RETRIES {
        return Err(invalid(format!(
            "scheduler.maxRetries must be at most {}, got {}",
            MAX_RETRIES, scheduler.max_retries
        )));
    }
    if scheduler.retry_base_delay_ms == 0 {
        return Err(invalid("scheduler.retryBaseDelayMs must be positive"));
    }
    if scheduler.retry_max_delay_ms < scheduler.retry_base_delay_ms {
        return Err(invalid(format!(
            "scheduler.retryMaxDelayMs ({}) is below retryBaseDelayMs ({})",
            scheduler.retry_max_delay_ms, scheduler.retry_base_delay_ms
        )));
    }

    let similarity = config.matching.min_similarity;
    if !(0.0..=1.0).contains(&similarity) {
        return Err(invalid(format!(
            "matching.minSimilarity must be within 0.0..=1.0, got {}",
            similarity
        )));
    }

    if config.limits.max_images == 0 {
        return Err(invalid("limits.maxImages must be positive"));
    }
    if config.limits.max_spreadsheet_bytes == 0 {
        return Err(invalid("limits.maxSpreadsheetBytes must be positive"));
    }

    let provider = &config.provider;
    if !provider.api_base.starts_with("http://") && !provider.api_base.starts_with("https://") {
        return Err(invalid(format!(
            "provider.apiBase must be an http(s) URL, got '{}'",
            provider.api_base
        )));
    }
    if provider.model.trim().is_empty() {
        return Err(invalid("provider.model must not be empty"));
    }
    if !(0.0..=2.0).contains(&provider.temperature) {
        return Err(invalid(format!(
            "provider.temperature must be within 0.0..=2.0, got {}",
            provider.temperature
        )));
    }
    if provider.timeout_secs == 0 {
        return Err(invalid("provider.timeoutSecs must be positive"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::{Language, Tone};
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config.scheduler.worker_count, 3);
        assert_eq!(config.scheduler.max_retries, 2);
        assert_eq!(config.scheduler.retry_base_delay_ms, 500);
        assert_eq!(config.scheduler.retry_max_delay_ms, 8_000);
        assert_eq!(config.matching.min_similarity, 0.2);
        assert_eq!(config.limits.max_images, 20);
        assert_eq!(config.limits.max_spreadsheet_bytes, 10 * 1024 * 1024);
        assert!(config.defaults.include_images);
        assert_eq!(config.provider.api_key_env_var.as_deref(), Some("OPENAI_API_KEY"));
    }

    #[test]
    fn test_load_yaml_file() {
        let file = write_temp(
            ".yaml",
            "scheduler:\n  workerCount: 5\ndefaults:\n  tone: casual\n  language: es\n  includeImages: false\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.scheduler.worker_count, 5);
        assert_eq!(config.defaults.tone, Tone::Casual);
        assert_eq!(config.defaults.language, Language::Spanish);
        assert!(!config.defaults.include_images);
    }

    #[test]
    fn test_load_json_file() {
        let file = write_temp(".json", r#"{"matching": {"minSimilarity": 0.5}}"#);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.matching.min_similarity, 0.5);
    }

    #[test]
    fn test_config_files_are_validated() {
        let json = write_temp(".json", r#"{"scheduler": {"workerCount": 0}}"#);
        assert!(matches!(
            load_config(json.path()),
            Err(ConfigError::Validation { .. })
        ));
        let yaml = write_temp(".yml", "limits:\n  maxImages: 0\n");
        assert!(matches!(
            load_config(yaml.path()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = write_temp(".toml", "");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("/no/such/bulkgen.yaml"),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        for bad in [
            r#"{"scheduler": {"workerCount": 0}}"#,
            r#"{"scheduler": {"workerCount": 33}}"#,
            r#"{"scheduler": {"maxRetries": 11}}"#,
            r#"{"scheduler": {"retryBaseDelayMs": 1000, "retryMaxDelayMs": 10}}"#,
            r#"{"matching": {"minSimilarity": 1.5}}"#,
            r#"{"limits": {"maxImages": 0}}"#,
            r#"{"provider": {"apiBase": "ftp://x"}}"#,
            r#"{"provider": {"temperature": 3.0}}"#,
        ] {
            assert!(
                matches!(load_config_from_str(bad), Err(ConfigError::Validation { .. })),
                "expected validation error for {}",
                bad
            );
        }
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = Config::default();
        config.provider.api_key = Some("sk-secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
