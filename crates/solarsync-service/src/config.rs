//! Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use solarsync_core::{ApiConfig, ValidationError};

/// Environment variable that overrides the default config file location.
pub const CONFIG_ENV_VAR: &str = "SOLARSYNC_CONFIG";

/// File name of the error log when none is configured.
pub const DEFAULT_ERROR_LOG_NAME: &str = "errors.log";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream API credentials and sites.
    pub api: ApiConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file yields the defaults, which are only usable for offline
    /// commands.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from `path`, or from the default location.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
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

    /// Validate everything needed to talk to the upstream API.
    ///
    /// This checks:
    /// - API URL, credentials and site ids are present
    /// - Request timeout is non-zero
    /// - Server bind address is `host:port`
    /// - Storage path is not empty
    ///
    /// # Example
    ///
    /// ```
    /// use solarsync_service::Config;
    ///
    /// let config = Config::default();
    /// // No credentials yet
    /// assert!(config.validate().is_err());
    /// assert!(config.validate_offline().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.api.validate();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        into_result(errors)
    }

    /// Validate what a sync or a named export needs: the API and the store.
    /// The `[server]` section is left to the service.
    pub fn validate_upstream(&self) -> Result<(), ConfigError> {
        let mut errors = self.api.validate();
        errors.extend(self.storage.validate());
        into_result(errors)
    }

    /// Validate only what commands working on the local database need.
    pub fn validate_offline(&self) -> Result<(), ConfigError> {
        into_result(self.storage.validate())
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the error log: the configured one, else next to the database.
    pub fn error_log_path(&self) -> PathBuf {
        match &self.logging.error_log {
            Some(path) => path.clone(),
            None => self
                .storage
                .path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_ERROR_LOG_NAME),
        }
    }
}

fn into_result(errors: Vec<ValidationError>) -> Result<(), ConfigError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

/// Shortest allowed background sync interval in seconds.
pub const MIN_SYNC_INTERVAL: u64 = 60;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
    /// Seconds between background syncs; 0 disables them.
    pub sync_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            sync_interval_secs: 0,
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

        if self.sync_interval_secs != 0 && self.sync_interval_secs < MIN_SYNC_INTERVAL {
            errors.push(ValidationError::new(
                "server.sync_interval_secs",
                format!(
                    "sync interval {} is too short (minimum {} seconds, or 0 to disable)",
                    self.sync_interval_secs, MIN_SYNC_INTERVAL
                ),
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
            path: solarsync_store::default_db_path(),
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

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// File that receives error-level events. Defaults to `errors.log`
    /// next to the database.
    pub error_log: Option<PathBuf>,
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

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
///
/// `$SOLARSYNC_CONFIG` if set, else `<config dir>/solarsync/config.toml`.
pub fn default_config_path() -> PathBuf {
    config_path_from(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn config_path_from(env: Option<PathBuf>) -> PathBuf {
    match env {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("solarsync")
            .join("config.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarsync_types::Resolution;

    fn valid_config() -> Config {
        Config {
            api: ApiConfig {
                email: "user@example.com".to_string(),
                password: "secret".to_string(),
                site_ids: vec!["0123456789ABCDEF".to_string()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.storage.path, solarsync_store::default_db_path());
        assert!(config.logging.error_log.is_none());
        assert_eq!(config.api.url, "https://cloud.solar-manager.ch");
    }

    #[test]
    fn test_config_parse_full() {
        let toml = r#"
            [api]
            url = "https://example.test"
            email = "user@example.com"
            password = "secret"
            site_ids = ["A", "B"]
            resolution = 900
            request_timeout_secs = 30

            [storage]
            path = "/tmp/solarsync/db.sqlite"

            [logging]
            error_log = "/tmp/solarsync/custom.log"

            [server]
            bind = "0.0.0.0:9000"
            sync_interval_secs = 3600
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.api.site_ids, vec!["A", "B"]);
        assert_eq!(config.api.resolution, Resolution::FifteenMinutes);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.sync_interval_secs, 3600);
        assert_eq!(
            config.error_log_path(),
            PathBuf::from("/tmp/solarsync/custom.log")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_unknown_resolution() {
        let toml = r#"
            [api]
            resolution = 60
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_error_log_defaults_next_to_database() {
        let config = Config {
            storage: StorageConfig {
                path: PathBuf::from("/var/lib/solarsync/db.sqlite"),
            },
            ..Default::default()
        };
        assert_eq!(
            config.error_log_path(),
            PathBuf::from("/var/lib/solarsync/errors.log")
        );
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = Config {
            api: ApiConfig {
                url: "ftp://nope".to_string(),
                request_timeout_secs: 0,
                ..Default::default()
            },
            server: ServerConfig {
                bind: "localhost".to_string(),
                sync_interval_secs: 5,
            },
            storage: StorageConfig {
                path: PathBuf::new(),
            },
            ..Default::default()
        };

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"api.url"));
        assert!(fields.contains(&"api.email"));
        assert!(fields.contains(&"api.password"));
        assert!(fields.contains(&"api.site_ids"));
        assert!(fields.contains(&"api.request_timeout_secs"));
        assert!(fields.contains(&"server.bind"));
        assert!(fields.contains(&"server.sync_interval_secs"));
        assert!(fields.contains(&"storage.path"));
    }

    #[test]
    fn test_validate_offline_ignores_api() {
        let config = Config::default();
        assert!(config.validate().is_err());
        assert!(config.validate_offline().is_ok());
    }

    #[test]
    fn test_validate_upstream_ignores_server() {
        let mut config = valid_config();
        config.server.bind = "not an address".to_string();
        assert!(config.validate().is_err());
        assert!(config.validate_upstream().is_ok());

        config.api.password.clear();
        let err = config.validate_upstream().unwrap_err();
        assert!(err.to_string().contains("api.password"));
    }

    #[test]
    fn test_server_bind_validation() {
        let bind = |s: &str| ServerConfig {
            bind: s.to_string(),
            ..Default::default()
        };
        assert!(bind("127.0.0.1:8080").validate().is_empty());
        assert!(bind("[::1]:8080").validate().is_empty());
        assert_eq!(bind("").validate().len(), 1);
        assert_eq!(bind("host:0").validate()[0].message, "port cannot be 0");
        assert!(bind("host:http").validate()[0].message.contains("invalid port"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![
            ValidationError::new("api.email", "login e-mail cannot be empty"),
            ValidationError::new("storage.path", "database path cannot be empty"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("  - api.email: login e-mail cannot be empty"));
        assert!(msg.contains("  - storage.path: database path cannot be empty"));
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = valid_config();
        config.save(&config_path).unwrap();
        let loaded = Config::load_validated(&config_path).unwrap();

        assert_eq!(loaded.api, config.api);
        assert_eq!(loaded.server.bind, config.server.bind);
        assert_eq!(loaded.storage.path, config.storage.path);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = Config::load(temp_dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[api\nurl = ").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_path_from_env() {
        assert_eq!(
            config_path_from(Some(PathBuf::from("/etc/solarsync.toml"))),
            PathBuf::from("/etc/solarsync.toml")
        );

        let fallback = config_path_from(None);
        assert!(fallback.ends_with("solarsync/config.toml"));
        assert_eq!(config_path_from(Some(PathBuf::new())), fallback);
    }
}
