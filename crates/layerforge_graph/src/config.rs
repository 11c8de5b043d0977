// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.
//!
//! Stored as RON next to the graph files:
//! - preview move cap
//! - fallback machine profile (used when the graph has no Printer node)
//! - global parameters visible to every node
//! - debounce window for file-watch re-runs

use crate::evaluation::Params;
use crate::normalize::DEFAULT_MAX_MOVES;
use crate::profile::MachineProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "layerforge.ron";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cap on previewed toolpath moves; `0` disables decimation
    pub max_preview_moves: usize,
    /// Profile used when the graph has no Printer node
    pub fallback_profile: MachineProfile,
    /// Global parameters
    pub params: Params,
    /// Debounce window for watch mode, in milliseconds
    pub watch_debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_preview_moves: DEFAULT_MAX_MOVES,
            fallback_profile: MachineProfile::default(),
            params: Params::new(),
            watch_debounce_ms: 250,
        }
    }
}

impl EngineConfig {
    /// Debounce window as a duration
    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    /// Set a global parameter
    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Load config from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Error reading or writing config and graph files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File contents are not valid RON for the expected type
    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: ron::error::SpannedError,
    },

    /// Value could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}
