//! Configuration loading for the Compass engine.
//!
//! TOML file given by `--config <path>` or `COMPASS_CONFIG`. Unknown keys are
//! rejected. Only logging has defaults; without a `[remote]` table the engine
//! runs offline.

use compass_remote::{RemoteConfig, RestClientError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the config file path.
pub const CONFIG_ENV_VAR: &str = "COMPASS_CONFIG";

/// Default `EnvFilter` directive when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "compass_engine=info,compass_remote=info,warn";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// JSON file holding the durable snapshot.
    pub snapshot_path: PathBuf,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or COMPASS_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Failed to build remote client: {0}")]
    Client(String),
}

impl From<RestClientError> for ConfigError {
    fn from(err: RestClientError) -> Self {
        match err {
            RestClientError::InvalidConfig { field, reason } => {
                ConfigError::InvalidValue { field, reason }
            }
            other => ConfigError::Client(other.to_string()),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "snapshot_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log.filter",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_runs_offline_with_default_logging() {
        let config = EngineConfig::from_toml_str(r#"snapshot_path = "data/compass.json""#).unwrap();
        assert!(config.remote.is_none());
        assert_eq!(config.log.filter, DEFAULT_LOG_FILTER);
        assert!(!config.log.json);
    }

    #[test]
    fn full_config_parses() {
        let config = EngineConfig::from_toml_str(
            r#"
            snapshot_path = "/var/lib/compass/state.json"

            [log]
            filter = "debug"
            json = true

            [remote]
            base_url = "https://compass.example.co"
            anon_key = "public-anon"
            request_timeout_ms = 8000
            "#,
        )
        .unwrap();
        assert!(config.log.json);
        assert_eq!(config.remote.unwrap().request_timeout_ms, 8000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            snapshot_path = "x.json"
            snapshot_dir = "oops"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn remote_values_are_validated() {
        let err = EngineConfig::from_toml_str(
            r#"
            snapshot_path = "x.json"

            [remote]
            base_url = "https://compass.example.co"
            anon_key = "k"
            request_timeout_ms = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "remote.request_timeout_ms",
                ..
            }
        ));
    }

    #[test]
    fn empty_snapshot_path_is_invalid() {
        let err = EngineConfig::from_toml_str(r#"snapshot_path = """#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "snapshot_path",
                ..
            }
        ));
    }
}
