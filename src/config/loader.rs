//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::InjectorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<InjectorConfig, ConfigError> {
    let config: InjectorConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<InjectorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::InjectionType;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [service]
        name = "storage-service"

        [rules.upload-errors]
        type = "http_error"
        service = "storage-service"
        endpoint = "/api/files/upload"
        rate = 0.5
        error_type = "storage"
        error_code = "DISK_FULL"
        error_msg = "No space left on device"

        [rules.slow-download]
        type = "http_latency"
        service = "storage-service"
        endpoint = "/api/files/download"
        rate = 1.0
        config = { delay_ms = 250 }
    "#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        let rules = config.injection_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, "slow-download");
        assert_eq!(rules[0].injection_type, InjectionType::HttpLatency);
        assert_eq!(rules[1].id, "upload-errors");
        assert_eq!(rules[1].error_code, "DISK_FULL");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.service.name, "storage-service");
        assert!(config.rules.is_empty());
        assert!(config.injection.enabled);
    }

    #[test]
    fn test_parse_and_validation_errors() {
        assert!(matches!(parse_config("rules = 3"), Err(ConfigError::Parse(_))));

        let invalid = r#"
            [rules.r1]
            type = "http_error"
            service = "svc"
            endpoint = "/a"
            rate = 2.0
        "#;
        match parse_config(invalid) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognised_rule_type_does_not_break_config() {
        let content = r#"
            [rules.future]
            type = "dns_error"
            service = "storage-service"
            endpoint = "/resolve"
            rate = 1.0

            [rules.upload-errors]
            type = "http_error"
            service = "storage-service"
            endpoint = "/api/files/upload"
            rate = 0.5
        "#;

        let config = parse_config(content).unwrap();
        let rules = config.injection_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, "future");
        assert_eq!(rules[0].injection_type, InjectionType::Unknown);
        assert_eq!(rules[1].injection_type, InjectionType::HttpError);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
