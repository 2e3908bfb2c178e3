//! Configuration file loading.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::schema::BalancerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Why a configuration file could not be turned into a usable config.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Read(std::io::Error),
    /// The file is not valid TOML for the schema.
    Syntax(toml::de::Error),
    /// The file parsed but fails semantic checks.
    Invalid(Vec<ValidationError>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(e) => write!(f, "cannot read config file: {}", e),
            ConfigError::Syntax(e) => write!(f, "cannot parse config file: {}", e),
            ConfigError::Invalid(errors) => {
                let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "invalid configuration: {}", joined.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl BalancerConfig {
    /// Read, parse, and validate a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: BalancerConfig = toml::from_str(&raw).map_err(ConfigError::Syntax)?;

        if let Err(errors) = validate_config(&config) {
            return Err(ConfigError::Invalid(errors));
        }

        tracing::debug!(path = %path.display(), "Configuration file loaded");
        Ok(config)
    }
}
