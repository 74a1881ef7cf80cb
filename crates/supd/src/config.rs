//! Daemon configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no
//! file at all) yields a working daemon with no interfaces.
//!
//! ```toml
//! log_filter = "supd=debug"
//! debug_level = "debug"
//!
//! [[interfaces]]
//! name = "wlan0"
//!
//! [[interfaces.networks]]
//! ssid = "home"
//! ```

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sup_core::memory::MAX_SSID_LEN;
use sup_core::{DebugLevel, InterfaceName};
use thiserror::Error;
use tracing::debug;

use crate::registry::DEFAULT_COMMAND_BUFFER;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SUPD_CONFIG";

/// Default log directives when neither the config nor `SUPD_LOG` set any.
pub const DEFAULT_LOG_FILTER: &str = "supd=info,sup_core=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// `tracing_subscriber::EnvFilter` directives.
    pub log_filter: String,

    /// Registry command channel capacity.
    pub command_buffer: usize,

    /// Queue length of each in-process observer endpoint.
    pub observer_buffer: usize,

    /// How long a delivery may wait on a full observer queue.
    pub delivery_timeout_ms: u64,

    /// Initial supplicant debug level.
    pub debug_level: DebugLevel,

    /// Interfaces the daemon core starts with.
    pub interfaces: Vec<InterfaceConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
            observer_buffer: 64,
            delivery_timeout_ms: 5_000,
            debug_level: DebugLevel::default(),
            interfaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceConfig {
    pub name: InterfaceName,

    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub ssid: String,
}

impl DaemonConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/sup/supd.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sup").join("supd.toml"))
    }

    /// Finds and loads the configuration.
    ///
    /// Lookup order: `explicit`, then `SUPD_CONFIG`, then the default path
    /// if that file exists. With none of them the defaults are used. An
    /// explicitly named file that cannot be read is an error.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        let path = match named {
            Some(path) => Some(path),
            None => Self::default_path().filter(|path| path.is_file()),
        };

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config");
                let config = Self::load(&path)?;
                Ok((config, Some(path)))
            }
            None => {
                debug!("No config file, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    /// Checks constraints the TOML types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_buffer == 0 {
            return Err(ConfigError::Invalid("command_buffer must be positive".into()));
        }
        if self.observer_buffer == 0 {
            return Err(ConfigError::Invalid("observer_buffer must be positive".into()));
        }
        if self.delivery_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "delivery_timeout_ms must be positive".into(),
            ));
        }

        let mut seen = HashSet::new();
        for iface in &self.interfaces {
            if !seen.insert(iface.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "interface {} listed twice",
                    iface.name
                )));
            }
            for network in &iface.networks {
                if network.ssid.len() > MAX_SSID_LEN {
                    return Err(ConfigError::Invalid(format!(
                        "ssid of a network on {} is {} bytes, max {}",
                        iface.name,
                        network.ssid.len(),
                        MAX_SSID_LEN
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}
