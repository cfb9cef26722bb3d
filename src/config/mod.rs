// Configuration module
//
// Layering: built-in defaults, then an optional YAML file (with ${VAR}
// substitution), then the PORT environment variable, then CLI overrides
// applied by the binary.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::{DEFAULT_STATIC_DIR, MAX_ICON_SIZE, PORT_ENV_VAR};

pub mod converter;
pub mod server;

pub use converter::ConverterConfig;
pub use server::ServerConfig;

fn default_static_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATIC_DIR)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Environment variable '{0}' is referenced but not set")]
    MissingEnvVar(String),

    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidEnvValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    /// Directory served for every path that is not an API route
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            converter: ConverterConfig::default(),
            static_dir: default_static_dir(),
        }
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ConfigError> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        // Check that all referenced environment variables exist before substituting
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            if std::env::var(var_name).is_err() {
                return Err(ConfigError::MissingEnvVar(var_name.to_string()));
            }
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        // An empty document deserializes to unit, not to a mapping
        if substituted.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(&substituted)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Build the effective configuration: file (or defaults) plus the
    /// `PORT` environment override.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let port = std::env::var(PORT_ENV_VAR).ok();
        config.apply_port_override(port.as_deref())?;
        config.validate()?;

        Ok(config)
    }

    /// Apply a `PORT`-style override. Empty values are treated as unset.
    pub fn apply_port_override(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(());
        };

        let port = raw
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvValue {
                name: PORT_ENV_VAR.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
        self.server.port = port;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.address cannot be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be > 0".to_string()));
        }

        if self.server.threads == 0 {
            return Err(ConfigError::Invalid(
                "server.threads must be > 0".to_string(),
            ));
        }

        let converter = &self.converter;

        if converter.max_file_size == 0 {
            return Err(ConfigError::Invalid(
                "converter.max_file_size must be > 0".to_string(),
            ));
        }

        if !(1..=100).contains(&converter.default_quality) {
            return Err(ConfigError::Invalid(format!(
                "converter.default_quality {} must be within 1-100",
                converter.default_quality
            )));
        }

        if converter.max_width_limit == 0 {
            return Err(ConfigError::Invalid(
                "converter.max_width_limit must be > 0".to_string(),
            ));
        }

        if converter.icon_sizes.is_empty() {
            return Err(ConfigError::Invalid(
                "converter.icon_sizes cannot be empty".to_string(),
            ));
        }

        if let Some(size) = converter
            .icon_sizes
            .iter()
            .find(|s| **s == 0 || **s > MAX_ICON_SIZE)
        {
            return Err(ConfigError::Invalid(format!(
                "converter.icon_sizes entry {} must be within 1-{}",
                size, MAX_ICON_SIZE
            )));
        }

        Ok(())
    }
}
