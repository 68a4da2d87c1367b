//! Interface configuration file.
//!
//! The config file (`interface_config.json` by default) names the source media
//! locations, the handler that understands each of them, known-missing files and
//! optional custom handlers. Relative paths in it are relative to the directory
//! holding the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::fs::FileSystem;
use crate::handler::HandlerSpec;

/// Expected value of the config file's `data_type` field.
pub const CONFIG_DATA_TYPE: &str = "source_media_config";

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "interface_config.json";

/// One source media location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceMediaEntry {
    /// Camera folder, relative to the config file directory.
    pub path: PathBuf,
    /// Folder under `path` whose children are the cards.
    #[serde(default)]
    pub card_subdir: PathBuf,
    /// Handler id.
    pub handler: String,
}

/// Corrections for what is actually on the cards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrataConfig {
    /// Files that are gone for good, relative to the config file directory.
    #[serde(default)]
    pub known_missing_files: Vec<PathBuf>,
}

/// Parsed config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Must be [`CONFIG_DATA_TYPE`].
    pub data_type: String,
    /// Source media locations.
    #[serde(default)]
    pub source_media: Vec<SourceMediaEntry>,
    /// Known-missing files.
    #[serde(default)]
    pub errata: ErrataConfig,
    /// Handlers in addition to the built-in ones.
    #[serde(default)]
    pub handlers: Vec<HandlerSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_type: CONFIG_DATA_TYPE.to_string(),
            source_media: Vec::new(),
            errata: ErrataConfig::default(),
            handlers: Vec::new(),
        }
    }
}

impl Config {
    /// Parse and check a config document. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidDataType`] for a foreign document.
    pub fn from_json(json: &str, path: &Path) -> std::result::Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if config.data_type != CONFIG_DATA_TYPE {
            return Err(ConfigError::InvalidDataType {
                found: config.data_type,
            });
        }
        Ok(config)
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Returns a filesystem error if the file cannot be read, or a config error
    /// if its content is invalid.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let content = fs.read_to_string(path)?;
        let config = Self::from_json(&content, path)?;

        info!(path = %path.display(), "Loaded config");
        debug!(
            sources = config.source_media.len(),
            known_missing = config.errata.known_missing_files.len(),
            handlers = config.handlers.len(),
            "Config contents"
        );
        Ok(config)
    }

    /// Add a source media location.
    #[must_use]
    pub fn with_source(
        mut self,
        path: impl Into<PathBuf>,
        card_subdir: impl Into<PathBuf>,
        handler: impl Into<String>,
    ) -> Self {
        self.source_media.push(SourceMediaEntry {
            path: path.into(),
            card_subdir: card_subdir.into(),
            handler: handler.into(),
        });
        self
    }

    /// Add a known-missing file.
    #[must_use]
    pub fn with_known_missing(mut self, path: impl Into<PathBuf>) -> Self {
        self.errata.known_missing_files.push(path.into());
        self
    }

    /// Add a custom handler.
    #[must_use]
    pub fn with_handler(mut self, spec: HandlerSpec) -> Self {
        self.handlers.push(spec);
        self
    }
}

/// Directory relative config paths are resolved against.
#[must_use]
pub fn config_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
