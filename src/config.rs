//! Application configuration
//!
//! Stored as JSON under the platform config directory
//! (`~/.config/cabal/config.json` on Linux). Every field has a default, so a
//! partial or missing file is fine.

use crate::error::{CabalError, Result, ResultExt as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Subdirectory of the root that holds the consumption extracts.
    /// Empty means the root itself.
    pub data_subdir: String,
    /// District lookup file, relative to the root
    pub lookup_file: String,
    /// Separator between levels of a hierarchical usage category
    pub usage_separator: String,
    /// How many census sections the ranking keeps
    pub top_sections: usize,
    /// Rows shown by table previews
    pub preview_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_subdir: "tablas_pequenas".to_owned(),
            lookup_file: crate::consumption::DEFAULT_LOOKUP_FILE.to_owned(),
            usage_separator: "/".to_owned(),
            top_sections: 20,
            preview_rows: 1000,
        }
    }
}

impl AppConfig {
    /// Default config file location.
    ///
    /// # Errors
    ///
    /// Fails when the platform has no config directory.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CabalError::Config("Failed to get config directory".to_owned()))?;
        Ok(config_dir.join("cabal").join("config.json"))
    }

    /// Loads the default config file, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads an explicit config file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Saves to `path`, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Fails when the directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Saves to the default location.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::save_to`].
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Directory holding the extracts for `root`.
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        if self.data_subdir.is_empty() {
            root.to_path_buf()
        } else {
            root.join(&self.data_subdir)
        }
    }
}
