//! Live filesystem capability.
//!
//! The refresh worker treats the live filesystem as a read-only oracle. Every
//! query is synchronous and infallible: implementations normalize I/O failures
//! to "absent" (`false`, `0`, empty listing) instead of propagating them.

mod local;
mod memory;

use std::path::{Path, PathBuf};

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

/// Queries the refresh worker issues against the real filesystem.
pub trait LiveFileSystem {
    /// Returns true if `path` exists (following symlinks).
    fn exists(&self, path: &Path) -> bool;

    /// Returns true if `path` is a directory (following symlinks).
    fn is_directory(&self, path: &Path) -> bool;

    /// Lists the entry names of a directory.
    fn list(&self, path: &Path) -> Vec<String>;

    /// Modification time in milliseconds since the Unix epoch.
    fn timestamp(&self, path: &Path) -> u64;

    /// Length in bytes.
    fn length(&self, path: &Path) -> u64;

    fn is_writable(&self, path: &Path) -> bool;

    /// Returns true if `path` itself is a symlink.
    fn is_symlink(&self, path: &Path) -> bool;

    /// Resolves a symlink to its target, or `None` if it is not a resolvable link.
    fn resolve_symlink(&self, path: &Path) -> Option<PathBuf>;

    /// Returns true for devices, sockets, fifos and other non-regular files.
    fn is_special_file(&self, path: &Path) -> bool;
}

/// Snapshot of a path's live attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveAttributes {
    pub exists: bool,
    pub is_directory: bool,
    pub timestamp: u64,
    pub length: u64,
    pub writable: bool,
    pub is_symlink: bool,
    pub is_special: bool,
    pub symlink_target: Option<PathBuf>,
}

impl LiveAttributes {
    /// Queries every attribute of `path`. A missing path yields the default
    /// (absent) snapshot.
    pub fn observe<F: LiveFileSystem + ?Sized>(fs: &F, path: &Path) -> Self {
        if !fs.exists(path) {
            return Self::default();
        }
        let is_symlink = fs.is_symlink(path);
        Self {
            exists: true,
            is_directory: fs.is_directory(path),
            timestamp: fs.timestamp(path),
            length: fs.length(path),
            writable: fs.is_writable(path),
            is_symlink,
            is_special: fs.is_special_file(path),
            symlink_target: if is_symlink {
                fs.resolve_symlink(path)
            } else {
                None
            },
        }
    }
}
