//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tracklog_core::{DEFAULT_RECENT_LIMIT, SamplerConfig};
use tracklog_types::Priority;

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Location sampling settings.
    pub sampling: SamplingConfig,
    /// Foreground keep-alive settings.
    pub keepalive: KeepAliveConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use tracklog_service::Config;
    ///
    /// let config = Config::default();
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.sampling.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
    /// Capacity of the sample change channel.
    pub broadcast_buffer: usize,
}

/// Default capacity of the sample change channel.
pub const DEFAULT_BROADCAST_BUFFER: usize = 100;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            broadcast_buffer: DEFAULT_BROADCAST_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new(
                "server.bind",
                "bind address cannot be empty",
            ));
        } else {
            match self.bind.rsplit_once(':') {
                None => errors.push(ValidationError::new(
                    "server.bind",
                    format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                )),
                Some((_, port)) => match port.parse::<u16>() {
                    Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                    Err(_) => errors.push(ValidationError::new(
                        "server.bind",
                        format!("invalid port '{}': must be a number 1-65535", port),
                    )),
                    Ok(_) => {}
                },
            }
        }

        if self.broadcast_buffer == 0 {
            errors.push(ValidationError::new(
                "server.broadcast_buffer",
                "broadcast buffer must be at least 1",
            ));
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: tracklog_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }

        errors
    }
}

/// Minimum update interval in seconds.
pub const MIN_UPDATE_INTERVAL: u64 = 1;
/// Maximum update interval in seconds (1 hour).
pub const MAX_UPDATE_INTERVAL: u64 = 3600;
/// Largest number of samples a snapshot may hold.
pub const MAX_RECENT_LIMIT: u32 = 100_000;

/// Location sampling configuration.
///
/// Fixed for the lifetime of a sampler; changes take effect on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Desired interval between location updates, in seconds.
    pub update_interval_secs: u64,
    /// Fastest accepted update interval, in seconds.
    pub fastest_interval_secs: u64,
    /// Accuracy priority requested from the provider.
    pub priority: Priority,
    /// Number of samples shown by the log, route and live feed.
    pub recent_limit: u32,
    /// Activate the background runner at startup.
    pub autostart: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let sampler = SamplerConfig::default();
        Self {
            update_interval_secs: sampler.update_interval.as_secs(),
            fastest_interval_secs: sampler.fastest_interval.as_secs(),
            priority: sampler.priority,
            recent_limit: DEFAULT_RECENT_LIMIT,
            autostart: true,
        }
    }
}

impl SamplingConfig {
    /// Sampler parameters described by this section.
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            update_interval: Duration::from_secs(self.update_interval_secs),
            fastest_interval: Duration::from_secs(self.fastest_interval_secs),
            priority: self.priority,
        }
    }

    /// Validate sampling configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("sampling.update_interval_secs", self.update_interval_secs),
            ("sampling.fastest_interval_secs", self.fastest_interval_secs),
        ] {
            if value < MIN_UPDATE_INTERVAL {
                errors.push(ValidationError::new(
                    field,
                    format!(
                        "interval {} is too short (minimum {} second)",
                        value, MIN_UPDATE_INTERVAL
                    ),
                ));
            } else if value > MAX_UPDATE_INTERVAL {
                errors.push(ValidationError::new(
                    field,
                    format!(
                        "interval {} is too long (maximum {} seconds / 1 hour)",
                        value, MAX_UPDATE_INTERVAL
                    ),
                ));
            }
        }

        if self.fastest_interval_secs > self.update_interval_secs {
            errors.push(ValidationError::new(
                "sampling.fastest_interval_secs",
                format!(
                    "fastest interval {} exceeds update interval {}",
                    self.fastest_interval_secs, self.update_interval_secs
                ),
            ));
        }

        if self.recent_limit == 0 || self.recent_limit > MAX_RECENT_LIMIT {
            errors.push(ValidationError::new(
                "sampling.recent_limit",
                format!("recent limit must be between 1 and {}", MAX_RECENT_LIMIT),
            ));
        }

        errors
    }
}

/// Foreground keep-alive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    /// Show a persistent desktop notification while tracking.
    ///
    /// Requires the `notifications` feature; otherwise the notice is logged.
    pub notification: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self { notification: true }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `sampling.recent_limit`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tracklog")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.broadcast_buffer, 100);
        assert_eq!(config.sampling.update_interval_secs, 10);
        assert_eq!(config.sampling.fastest_interval_secs, 5);
        assert_eq!(config.sampling.priority, Priority::HighAccuracy);
        assert_eq!(config.sampling.recent_limit, 1000);
        assert!(config.sampling.autostart);
        assert!(config.keepalive.notification);
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.path, tracklog_store::default_db_path());
    }

    #[test]
    fn test_sampler_config_conversion() {
        let sampling = SamplingConfig {
            update_interval_secs: 5,
            fastest_interval_secs: 2,
            priority: Priority::LowPower,
            ..Default::default()
        };
        let sampler = sampling.sampler_config();
        assert_eq!(sampler.update_interval, Duration::from_secs(5));
        assert_eq!(sampler.fastest_interval, Duration::from_secs(2));
        assert_eq!(sampler.priority, Priority::LowPower);
        assert_eq!(SamplingConfig::default().sampler_config(), SamplerConfig::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("server.toml");

        let mut config = Config::default();
        config.server.bind = "0.0.0.0:9090".to_string();
        config.storage.path = PathBuf::from("/tmp/test.db");
        config.sampling.priority = Priority::BalancedPowerAccuracy;
        config.sampling.autostart = false;

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "0.0.0.0:9090");
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(loaded.sampling.priority, Priority::BalancedPowerAccuracy);
        assert!(!loaded.sampling.autostart);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [server]
            bind = "192.168.1.1:8888"
            broadcast_buffer = 32

            [storage]
            path = "/data/location_speed.db"

            [sampling]
            update_interval_secs = 5
            fastest_interval_secs = 2
            priority = "passive"
            recent_limit = 10
            autostart = false

            [keepalive]
            notification = false
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "192.168.1.1:8888");
        assert_eq!(config.server.broadcast_buffer, 32);
        assert_eq!(config.storage.path, PathBuf::from("/data/location_speed.db"));
        assert_eq!(config.sampling.priority, Priority::Passive);
        assert_eq!(config.sampling.recent_limit, 10);
        assert!(!config.sampling.autostart);
        assert!(!config.keepalive.notification);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[sampling]\nrecent_limit = 10\n").unwrap();
        assert_eq!(config.sampling.recent_limit, 10);
        assert_eq!(config.sampling.update_interval_secs, 10);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("tracklog/server.toml"));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_server_bind_validation() {
        let valid = ServerConfig::default();
        assert!(valid.validate().is_empty());

        let no_port = ServerConfig {
            bind: "127.0.0.1".to_string(),
            ..Default::default()
        };
        let errors = no_port.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("host:port"));

        let port_zero = ServerConfig {
            bind: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        assert!(port_zero.validate()[0].message.contains("cannot be 0"));

        let bad_port = ServerConfig {
            bind: "127.0.0.1:abc".to_string(),
            ..Default::default()
        };
        assert!(bad_port.validate()[0].message.contains("must be a number"));

        let no_buffer = ServerConfig {
            broadcast_buffer: 0,
            ..Default::default()
        };
        assert_eq!(no_buffer.validate()[0].field, "server.broadcast_buffer");
    }

    #[test]
    fn test_storage_path_validation() {
        let empty = StorageConfig {
            path: PathBuf::new(),
        };
        let errors = empty.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be empty"));
    }

    #[test]
    fn test_sampling_validation() {
        let zero = SamplingConfig {
            update_interval_secs: 0,
            fastest_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate().len(), 2);

        let inverted = SamplingConfig {
            update_interval_secs: 5,
            fastest_interval_secs: 10,
            ..Default::default()
        };
        let errors = inverted.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("exceeds"));

        let too_long = SamplingConfig {
            update_interval_secs: 7200,
            ..Default::default()
        };
        assert!(too_long.validate()[0].message.contains("too long"));

        let no_limit = SamplingConfig {
            recent_limit: 0,
            ..Default::default()
        };
        assert_eq!(no_limit.validate()[0].field, "sampling.recent_limit");
    }

    #[test]
    fn test_config_validation_error_display() {
        let config = Config {
            server: ServerConfig {
                bind: "".to_string(),
                ..Default::default()
            },
            storage: StorageConfig {
                path: PathBuf::new(),
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        let display = err.to_string();
        assert!(display.contains("Configuration validation failed"));
        assert!(display.contains("server.bind"));
        assert!(display.contains("storage.path"));
    }
}
