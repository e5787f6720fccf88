//! Application configuration management.
//!
//! Settings are layered with the `config` crate:
//! 1. built-in defaults
//! 2. an optional TOML file (see [`PcConfig::config_path`])
//! 3. environment variables such as `BILLSPC__PERIPHERAL__LOCAL_NAME`
//!
//! The peripheral section is turned into the session's advertisement once,
//! at start-up.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::session::AdvertisementConfig;

/// Service UUID advertised by default.
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0xd78a_31fe_e14f_4f6a_a107_790a_b0d5_8f27);

/// Characteristic UUID registered by default.
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xebe6_204c_c1ee_4d09_97b8_f77f_360f_7372);

/// Local name advertised by default.
pub const DEFAULT_LOCAL_NAME: &str = "Bill's PC";

/// Longest local name accepted, the GAP device name limit in bytes.
pub const MAX_LOCAL_NAME_LEN: usize = 248;

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "BILLSPC_CONFIG";

const ENV_PREFIX: &str = "BILLSPC";
const ENV_SEPARATOR: &str = "__";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The layered sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The platform configuration directory could not be determined.
    #[error("Cannot determine configuration directory")]
    NoConfigDir,

    /// A single field is invalid.
    #[error("Invalid {field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields are invalid.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcConfig {
    /// What the peripheral registers and advertises.
    pub peripheral: PeripheralConfig,

    /// HTTP surface.
    pub server: ServerConfig,

    /// Log output.
    pub logging: LoggingConfig,
}

/// Peripheral identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    /// Primary service UUID.
    pub service_uuid: Uuid,

    /// Characteristic UUID.
    pub characteristic_uuid: Uuid,

    /// Advertised local name.
    pub local_name: String,

    /// Switch the adapter on at start-up instead of waiting for it.
    pub power_on_adapter: bool,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            service_uuid: DEFAULT_SERVICE_UUID,
            characteristic_uuid: DEFAULT_CHARACTERISTIC_UUID,
            local_name: DEFAULT_LOCAL_NAME.to_string(),
            power_on_adapter: false,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_address: String,

    /// Port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON file logs plus compact stdout instead of pretty stdout.
    pub production: bool,

    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            production: false,
            level: "info".to_string(),
        }
    }
}

impl PcConfig {
    /// Load from the default path plus the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or the result is invalid.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load from `path` (optional) plus the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or the result is invalid.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: &Path, env: config::Environment) -> ConfigResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(env)
            .build()?;
        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check every field, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or [`ConfigError::MultipleValidationErrors`]
    /// when more than one field is wrong.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let invalid = |field: &str, message: &str| ConfigError::ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        };

        let name = &self.peripheral.local_name;
        if name.trim().is_empty() {
            errors.push(invalid("peripheral.local_name", "must not be empty"));
        } else if name.len() > MAX_LOCAL_NAME_LEN {
            errors.push(invalid(
                "peripheral.local_name",
                &format!("must be at most {MAX_LOCAL_NAME_LEN} bytes"),
            ));
        }

        if self.peripheral.service_uuid == self.peripheral.characteristic_uuid {
            errors.push(invalid(
                "peripheral.characteristic_uuid",
                "must differ from the service UUID",
            ));
        }

        if self.server.port == 0 {
            errors.push(invalid("server.port", "must not be 0"));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// The fixed advertisement for the session.
    #[must_use]
    pub fn advertisement(&self) -> AdvertisementConfig {
        AdvertisementConfig {
            service_uuid: self.peripheral.service_uuid,
            characteristic_uuid: self.peripheral.characteristic_uuid,
            local_name: self.peripheral.local_name.clone(),
        }
    }

    /// Get the configuration file path.
    ///
    /// `BILLSPC_CONFIG` wins if set.
    ///
    /// # Errors
    ///
    /// Returns an error if no platform configuration directory exists.
    pub fn config_path() -> ConfigResult<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        // On a Linux host: /etc/billspc/config.toml
        // Elsewhere: the platform config dir
        #[cfg(target_os = "linux")]
        {
            Ok(PathBuf::from("/etc/billspc/config.toml"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs = directories::ProjectDirs::from("", "", "billspc")
                .ok_or(ConfigError::NoConfigDir)?;
            Ok(dirs.config_dir().join("config.toml"))
        }
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
