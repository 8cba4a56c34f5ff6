//! Build settings, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{Error, Result};
use crate::bvh::RecordLayout;

/// Number of SAH candidate planes evaluated per split.
pub const DEFAULT_BINS: usize = 10;

/// Settings controlling BVH construction and buffer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Equally spaced candidate planes per split search.
    pub bins: usize,
    /// Byte layout of each record at the output boundary.
    pub layout: RecordLayout,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            layout: RecordLayout::Padded,
        }
    }
}

impl BuildSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate settings from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the settings describe a usable build.
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(Error::InvalidSettings("bins must be at least 1".into()));
        }
        Ok(())
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
