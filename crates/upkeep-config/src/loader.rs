//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::UpkeepConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Load and validate the full configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<UpkeepConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: UpkeepConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &UpkeepConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "observability.log_level '{}' is not one of {:?}",
            config.observability.log_level, LOG_LEVELS
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let file = write_config("{}");
        let config = load_config(file.path()).expect("load");
        assert_eq!(config.version, 1);
        assert_eq!(config.app.name, "upkeep");
        assert_eq!(config.maintenance.threads_max, 2);
        assert_eq!(config.maintenance.seconds_actions_block, 2);
        assert_eq!(config.maintenance.seconds_tasks_linger, 0);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_partial_config_overrides_defaults() {
        let file = write_config(
            "app:\n  name: janitor\nmaintenance:\n  threads_max: 8\n  seconds_actions_block: 0\n",
        );
        let config = load_config(file.path()).expect("load");
        assert_eq!(config.app.name, "janitor");
        assert_eq!(config.maintenance.threads_max, 8);
        assert_eq!(config.maintenance.seconds_actions_block, 0);
        // Untouched sections keep their defaults.
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let file = write_config("observability:\n  log_level: loud\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_empty_app_name_is_rejected() {
        let file = write_config("app:\n  name: \"  \"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/upkeep.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
