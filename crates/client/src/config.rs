//! Client configuration.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. Defaults (hardcoded)
//! 2. Configuration file (TOML), when one is given
//! 3. Environment variables prefixed with `ORGSERVICE_`, using `__` to
//!    separate nested keys
//!
//! # Example
//!
//! ```toml
//! [batching]
//! max_number_of_batches = 1000
//! max_number_of_requests_in_a_batch = 1000
//!
//! [metadata]
//! staleness_window_secs = 1800
//!
//! [logging]
//! level = "debug"
//! json = true
//! ```
//!
//! `ORGSERVICE_LOGGING__LEVEL=trace` overrides `logging.level`.

use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use orgservice::{BatchLimits, MetadataCacheSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ClientConfig {
    /// Batch registry limits.
    #[serde(default)]
    pub batching: BatchLimits,

    /// Metadata cache settings.
    #[serde(default)]
    pub metadata: MetadataCacheSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Logging settings consumed by [`crate::init_logging`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is not set (e.g. `"info"` or
    /// `"orgservice=debug,info"`).
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// A source could not be read or deserialised.
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    /// The given configuration file does not exist.
    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    /// The merged values failed validation.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

const ENV_PREFIX: &str = "ORGSERVICE";

impl ClientConfig {
    /// Loads configuration from a TOML file with environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ClientConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(environment())
            .build()?;

        let client_config: ClientConfig = config.try_deserialize()?;
        client_config.validate()?;
        Ok(client_config)
    }

    /// Loads configuration from defaults and environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ClientConfig::default())?)
            .add_source(environment())
            .build()?;

        let client_config: ClientConfig = config.try_deserialize()?;
        client_config.validate()?;
        Ok(client_config)
    }

    /// Rejects values the core components cannot work with.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.batching.max_number_of_batches == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "batching.max_number_of_batches must be greater than 0".to_string(),
            });
        }
        if self.batching.max_number_of_requests_in_a_batch == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "batching.max_number_of_requests_in_a_batch must be greater than 0"
                    .to_string(),
            });
        }
        if self.metadata.staleness_window_secs == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "metadata.staleness_window_secs must be greater than 0".to_string(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "logging.level must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
