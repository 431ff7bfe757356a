//! Refresh configuration.
//!
//! `VfsConfig` is the persisted, JSON-backed form; `RefreshOptions` is what a
//! single `RefreshWorker` consumes.

use std::path::Path;

use fnv::FnvHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VfsError};

pub const VFS_CONFIG_FILENAME: &str = "vfs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Descend into subdirectories when refreshing.
    pub recursive: bool,
    /// Compare file lengths in addition to timestamps.
    pub compare_length: bool,
    /// Entry names that are never mirrored (e.g. `.git`).
    pub ignored_names: Vec<String>,
    /// Start a filesystem watcher for the root.
    pub watch: bool,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            compare_length: true,
            ignored_names: Vec::new(),
            watch: false,
        }
    }
}

impl VfsConfig {
    pub fn from_json_str(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|error| VfsError::Config(format!("failed to parse vfs config: {error}")))
    }

    /// Loads `vfs.json` from `dir`, falling back to defaults when it is absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(VFS_CONFIG_FILENAME);
        if !path.exists() {
            log::debug!("no vfs config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(&path).map_err(|error| {
            VfsError::Config(format!(
                "failed to read vfs config {}: {error}",
                path.display()
            ))
        })?;
        serde_json::from_str(&data).map_err(|error| {
            VfsError::Config(format!(
                "failed to parse vfs config {}: {error}",
                path.display()
            ))
        })
    }

    pub fn ignored(&self) -> IgnoredNames {
        IgnoredNames::new(self.ignored_names.iter().cloned())
    }

    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            recursive: self.recursive,
            compare_length: self.compare_length,
            ignored: self.ignored(),
        }
    }
}

/// Names excluded from the mirror.
///
/// `.`, `..` and the empty name are always excluded.
#[derive(Debug, Clone, Default)]
pub struct IgnoredNames(FnvHashSet<String>);

impl IgnoredNames {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self(names.into_iter().collect())
    }

    #[inline]
    pub fn is_ignored(&self, name: &str) -> bool {
        name.is_empty() || name == "." || name == ".." || self.0.contains(name)
    }
}

/// Options for one refresh scan.
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub recursive: bool,
    pub compare_length: bool,
    pub ignored: IgnoredNames,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        VfsConfig::default().refresh_options()
    }
}

impl RefreshOptions {
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}
