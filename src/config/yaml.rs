//! YAML configuration loading.

use std::path::Path;

use super::error::ConfigError;
use super::types::DispatchConfig;

/// Loader for YAML configuration files.
pub struct YamlLoader;

impl YamlLoader {
    /// Load configuration from a file.
    pub fn load_config(path: impl AsRef<Path>) -> Result<DispatchConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DispatchConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse_config(yaml: &str) -> Result<DispatchConfig, ConfigError> {
        let config: DispatchConfig = serde_yaml::from_str(yaml)?;
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Reject settings that would leave an instance unable to run work.
    fn validate_config(config: &DispatchConfig) -> Result<(), ConfigError> {
        if config.scheduler.capacity == 0 {
            return Err(ConfigError::invalid("scheduler.capacity", "must be positive"));
        }
        if config.worker_pool.capacity == 0 {
            return Err(ConfigError::invalid("worker_pool.capacity", "must be positive"));
        }
        if config.worker_pool.grace_period.is_zero() {
            return Err(ConfigError::invalid(
                "worker_pool.grace_period",
                "must be longer than zero",
            ));
        }
        Ok(())
    }
}
