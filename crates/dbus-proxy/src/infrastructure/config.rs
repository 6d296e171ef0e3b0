//! TOML-based configuration for the inspect tool.
//!
//! The file names the remote object to inspect and the default log level:
//!
//! ```toml
//! [object]
//! bus_name = "org.freedesktop.NetworkManager"
//! path = "/org/freedesktop/NetworkManager"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a `#[serde(default = "...")]` helper, so a missing file
//! section or key falls back to the built-in value and an empty file is a
//! valid configuration.

use std::path::{Path, PathBuf};

use dbus_proxy_core::{NameError, ObjectRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configured object is not addressable.
    #[error("invalid object in config: {0}")]
    InvalidObject(#[from] NameError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    #[serde(default)]
    pub object: ObjectConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The remote object whose interfaces are proxied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectConfig {
    /// Well-known or unique bus name of the peer.
    #[serde(default = "default_bus_name")]
    pub bus_name: String,
    /// Object path on that peer.
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive: `"error"`, `"warn"`, `"info"`, `"debug"`,
    /// `"trace"` or a full `EnvFilter` expression.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bus_name() -> String {
    "org.freedesktop.DBus".to_string()
}
fn default_path() -> String {
    "/org/freedesktop/DBus".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            bus_name: default_bus_name(),
            path: default_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ObjectConfig {
    /// Validates the configured names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidObject`] if either name is malformed.
    pub fn object_ref(&self) -> Result<ObjectRef, ConfigError> {
        Ok(ObjectRef::new(&self.bus_name, &self.path)?)
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

impl ProxyConfig {
    /// Loads the configuration at `path`, returning `ProxyConfig::default()`
    /// if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system errors other than "not found",
    /// and [`ConfigError::Parse`] if the TOML is malformed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Writes the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system failures or
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
