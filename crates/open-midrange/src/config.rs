//! CLI configuration: default CCSID, reader cache and data-stream limits.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use open_midrange_ccsid::ReaderOptions;
use open_midrange_datastream::DataStreamConfig;

/// Errors loading a configuration file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {}", .path.display())]
    #[diagnostic(code(config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Invalid config file {}", .path.display())]
    #[diagnostic(code(config::parse), help("see the [reader] and [datastream] sections"))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level CLI configuration.
///
/// ```toml
/// default_ccsid = 37
///
/// [reader]
/// cache_size = 1024
///
/// [datastream]
/// max_frame_length = 16777216
/// header_pool_idle = 8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMidrangeConfig {
    /// CCSID used when a command is given no `--ccsid`.
    #[serde(default = "default_ccsid")]
    pub default_ccsid: u16,
    /// Character reader settings.
    #[serde(default)]
    pub reader: ReaderOptions,
    /// Frame dispatcher settings.
    #[serde(default)]
    pub datastream: DataStreamConfig,
}

impl Default for OpenMidrangeConfig {
    fn default() -> Self {
        Self {
            default_ccsid: default_ccsid(),
            reader: ReaderOptions::default(),
            datastream: DataStreamConfig::default(),
        }
    }
}

fn default_ccsid() -> u16 {
    37
}

impl OpenMidrangeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                tracing::debug!(path = %path.display(), "Loaded config");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }
}
