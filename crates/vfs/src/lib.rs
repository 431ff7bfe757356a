//! Virtual filesystem snapshot and incremental refresh library.
//!
//! This crate keeps an in-memory mirror of a directory tree and brings it back
//! in sync with the disk:
//! - Arena-backed cached snapshot tree with per-entry dirty flags
//! - Live filesystem capability (local disk and in-memory)
//! - Refresh worker that diffs dirty entries into change events
//! - Dirty marking from filesystem watcher events
//! - A service owning the tree under a lock

pub mod config;
pub mod error;
pub mod live;
pub mod refresh;
pub mod service;
pub mod storage;
pub mod watcher;

// Re-export main types
pub use config::{IgnoredNames, RefreshOptions, VfsConfig};
pub use error::{Result, VfsError};
pub use live::{LiveAttributes, LiveFileSystem, LocalFileSystem, MemoryFileSystem};
pub use refresh::{
    apply_events, mark_paths_dirty, mark_subtrees_dirty, ChangeEvent, EntryProperty,
    RefreshSessionId, RefreshWorker,
};
pub use service::{RefreshOutcome, VfsService};
pub use storage::{CachedEntry, CachedTree, DirectoryChildren, EntryFlags, EntryId, EntryKind};
pub use watcher::{create_watcher, WatcherEvent};
