//! Configuration for the drivers binary using Figment
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. `drivers.toml` in the working directory, when present
//! 3. Environment variables prefixed `DRIVERS_` (for example `DRIVERS_TRIM=fancy`)

use crate::drivers::Trim;
use cmdforge::config::DEFAULT_NONE_LITERALS;
use cmdforge::CliSettings;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILE: &str = "drivers.toml";
pub const ENV_PREFIX: &str = "DRIVERS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] figment::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriversConfig {
    /// Which driver hierarchy the command line is synthesized from
    pub trim: Trim,
    /// Default tracing filter; `RUST_LOG` wins when set
    pub log_level: String,
    pub default_command: Option<String>,
    pub none_literals: Vec<String>,
}

impl Default for DriversConfig {
    fn default() -> Self {
        Self {
            trim: Trim::Plain,
            log_level: "warn".to_string(),
            default_command: None,
            none_literals: DEFAULT_NONE_LITERALS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl DriversConfig {
    /// Load from the working directory and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path).extract()?;
        debug!(?config, "loaded configuration");
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().into()))
    }

    /// Settings for the synthesized command line
    pub fn settings(&self) -> CliSettings {
        CliSettings {
            program: "drivers".to_string(),
            about: Some(format!("Drive around in a {} car", self.trim)),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            default_command: self.default_command.clone(),
            none_literals: self.none_literals.clone(),
            ..CliSettings::default()
        }
    }
}
