//! Live filesystem backed by the local disk.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::LiveFileSystem;

/// `LiveFileSystem` over `std::fs`.
///
/// Failed queries are logged at debug level and answered as "absent".
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn metadata(path: &Path) -> Option<Metadata> {
        match fs::metadata(path) {
            Ok(metadata) => Some(metadata),
            Err(error) => {
                log::debug!("cannot stat {}: {error}", path.display());
                None
            }
        }
    }
}

impl LiveFileSystem for LocalFileSystem {
    /// A symlink exists even when its target does not.
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_directory(&self, path: &Path) -> bool {
        Self::metadata(path).is_some_and(|metadata| metadata.is_dir())
    }

    fn list(&self, path: &Path) -> Vec<String> {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(error) => {
                log::debug!("cannot list {}: {error}", path.display());
                return Vec::new();
            }
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn timestamp(&self, path: &Path) -> u64 {
        Self::metadata(path)
            .and_then(|metadata| metadata.modified().ok())
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_millis() as u64)
            .unwrap_or(0)
    }

    fn length(&self, path: &Path) -> u64 {
        Self::metadata(path).map_or(0, |metadata| metadata.len())
    }

    fn is_writable(&self, path: &Path) -> bool {
        Self::metadata(path).is_some_and(|metadata| !metadata.permissions().readonly())
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|metadata| metadata.file_type().is_symlink())
    }

    fn resolve_symlink(&self, path: &Path) -> Option<PathBuf> {
        if !self.is_symlink(path) {
            return None;
        }
        fs::canonicalize(path).ok()
    }

    fn is_special_file(&self, path: &Path) -> bool {
        Self::metadata(path).is_some_and(|metadata| !metadata.is_file() && !metadata.is_dir())
    }
}
