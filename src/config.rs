//! Configuration loader and validator
//!
//! Loads the remote-control configuration from TOML files in the configs/
//! directory.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub settings: Settings,

    /// Software-declared input sources
    #[serde(default)]
    pub virtuals: Vec<VirtualDevice>,

    /// Physical producers simulated by the standalone server
    #[serde(default)]
    pub producers: Vec<ProducerConfig>,
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding `<device>.json` key maps. Saving is disabled without it.
    #[serde(default)]
    pub persistent_path: Option<PathBuf>,

    /// Key map used by devices that have neither a persisted nor their own map
    #[serde(default)]
    pub default_mapfile: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Capacity of the injected key event queue
    #[serde(default = "default_event_queue")]
    pub event_queue: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            persistent_path: None,
            default_mapfile: None,
            log_level: default_log_level(),
            event_queue: default_event_queue(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_event_queue() -> usize { 100 }
fn default_true() -> bool { true }

/// A virtual device, known only by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDevice {
    pub name: String,

    /// Key map loaded when no persisted map exists
    #[serde(default)]
    pub mapfile: Option<PathBuf>,
}

/// A simulated physical producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub name: String,

    #[serde(default)]
    pub metadata: String,

    #[serde(default = "default_true")]
    pub pairable: bool,

    /// Key map loaded when no persisted map exists
    #[serde(default)]
    pub mapfile: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::parse(&content)?;

        info!("✓ Config loaded");
        Ok(config)
    }

    /// Load default configuration from configs/default.toml
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("configs/default.toml")
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;

        debug!("  - Virtual devices: {}", config.virtuals.len());
        debug!("  - Producers: {}", config.producers.len());
        debug!("  - Persistent path: {:?}", config.settings.persistent_path);

        config.validate()?;
        Ok(config)
    }

    /// Names of all virtual devices, in declaration order
    pub fn virtual_names(&self) -> Vec<String> {
        self.virtuals.iter().map(|v| v.name.clone()).collect()
    }

    /// Configured key map file for a device, falling back to the global default
    pub fn mapfile_for(&self, device: &str) -> Option<&Path> {
        let own = self
            .virtuals
            .iter()
            .find(|v| v.name == device)
            .and_then(|v| v.mapfile.as_deref())
            .or_else(|| {
                self.producers
                    .iter()
                    .find(|p| p.name == device)
                    .and_then(|p| p.mapfile.as_deref())
            });
        own.or(self.settings.default_mapfile.as_deref())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.event_queue == 0 {
            return Err(ConfigError::Invalid("event_queue must be greater than 0".into()));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let names = self
            .virtuals
            .iter()
            .map(|v| (v.name.as_str(), "virtual device"))
            .chain(self.producers.iter().map(|p| (p.name.as_str(), "producer")));

        for (name, kind) in names {
            Self::validate_name(name, kind)?;
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!(
                    "Device name '{}' is declared more than once. \
                    A device is either virtual or physical, never both.",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Device names become file names, so keep them to a single path component
    fn validate_name(name: &str, kind: &str) -> Result<(), ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{} name must not be empty", kind)));
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(ConfigError::Invalid(format!(
                "Invalid {} name '{}': must not contain path separators",
                kind, name
            )));
        }
        Ok(())
    }
}
