//! Configuration settings for vitalsync.
//!
//! Settings are loaded from `config.yaml` under the data root. Every field has
//! a default, so a partial (or missing) file is fine.

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::error::VitalSyncError;
use crate::sync::QueueSettings;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Offline queue settings.
    pub queue: QueueConfig,
    /// Logging settings.
    pub log: LogConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
}

/// Offline queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Failed apply attempts before an item is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Number of sync history entries to keep.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Storage key of the live queue.
    #[serde(default = "default_queue_key")]
    pub queue_key: String,
    /// Storage key of the dead-letter list.
    #[serde(default = "default_failed_key")]
    pub failed_key: String,
    /// Storage key of the sync history.
    #[serde(default = "default_history_key")]
    pub history_key: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions for serde
const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_history_limit() -> usize {
    50
}

fn default_queue_key() -> String {
    "offline_queue".to_string()
}

fn default_failed_key() -> String {
    "offline_queue_failed".to_string()
}

fn default_history_key() -> String {
    "sync_history".to_string()
}

fn default_log_filter() -> String {
    "vitalsync=info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            history_limit: default_history_limit(),
            queue_key: default_queue_key(),
            failed_key: default_failed_key(),
            history_key: default_history_key(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl QueueConfig {
    /// Convert into the engine's settings.
    #[must_use]
    pub fn to_settings(&self) -> QueueSettings {
        QueueSettings {
            max_retries: self.max_retries,
            history_limit: self.history_limit,
            queue_key: self.queue_key.clone(),
            failed_key: self.failed_key.clone(),
            history_key: self.history_key.clone(),
        }
    }
}

impl Config {
    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, VitalSyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            VitalSyncError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            VitalSyncError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), VitalSyncError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| VitalSyncError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            VitalSyncError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }

    fn validate(&self) -> Result<(), VitalSyncError> {
        if self.queue.max_retries == 0 {
            return Err(VitalSyncError::Config(
                "queue.max_retries must be at least 1".to_string(),
            ));
        }
        if self.queue.history_limit == 0 {
            return Err(VitalSyncError::Config(
                "queue.history_limit must be at least 1".to_string(),
            ));
        }

        let keys = [
            &self.queue.queue_key,
            &self.queue.failed_key,
            &self.queue.history_key,
        ];
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(VitalSyncError::Config(
                "queue storage keys must not be empty".to_string(),
            ));
        }
        if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
            return Err(VitalSyncError::Config(
                "queue storage keys must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.general.default_output, OutputFormat::Pretty);
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.queue.history_limit, 50);
        assert_eq!(config.queue.queue_key, "offline_queue");
        assert_eq!(config.log.filter, "vitalsync=info");
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let config = Config::load_from_path(&config_path).unwrap();

        assert_eq!(config.queue.max_retries, 3);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut config = Config::default();
        config.queue.max_retries = 5;
        config.queue.history_limit = 10;

        config.save_to_path(&config_path).unwrap();

        let loaded = Config::load_from_path(&config_path).unwrap();

        assert_eq!(loaded.queue.max_retries, 5);
        assert_eq!(loaded.queue.history_limit, 10);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let partial_yaml = r"
queue:
  max_retries: 7
";
        std::fs::write(&config_path, partial_yaml).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();

        assert_eq!(config.queue.max_retries, 7);
        // Defaults fill the rest
        assert_eq!(config.queue.history_limit, 50);
        assert_eq!(config.queue.history_key, "sync_history");
        assert_eq!(config.general.default_output, OutputFormat::Pretty);
    }

    #[test]
    fn test_rejects_zero_retries() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "queue:\n  max_retries: 0\n").unwrap();

        let err = Config::load_from_path(&config_path).unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_rejects_shared_keys() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            "queue:\n  queue_key: same\n  history_key: same\n",
        )
        .unwrap();

        assert!(Config::load_from_path(&config_path).is_err());
    }

    #[test]
    fn test_to_settings() {
        let config = Config::default();
        let settings = config.queue.to_settings();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.failed_key, "offline_queue_failed");
    }
}
