//! Filesystem watching on top of `notify`.
//!
//! Watcher callbacks send events through a crossbeam channel instead of
//! touching the cached tree. The owner of the tree drains the channel and
//! turns the paths into dirty entries before the next refresh.

use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Result, VfsError};

/// An event sent from the watcher to the tree owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    /// Paths whose entries may be stale.
    PathsChanged(Vec<PathBuf>),
    /// Events were dropped; the listed subtrees (or the whole tree when
    /// empty) must be rescanned.
    RescanRequired(Vec<PathBuf>),
    /// The watcher encountered an error.
    Error(String),
}

/// Starts watching `root`. A file root is watched through its parent
/// directory.
pub fn create_watcher(
    root: &Path,
    recursive: bool,
    event_tx: Sender<WatcherEvent>,
) -> Result<RecommendedWatcher> {
    let mut watcher =
        recommended_watcher(move |event_result: notify::Result<Event>| match event_result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                let message = if event.need_rescan() || event.paths.is_empty() {
                    WatcherEvent::RescanRequired(event.paths)
                } else {
                    WatcherEvent::PathsChanged(event.paths)
                };
                if event_tx.send(message).is_err() {
                    log::debug!("watcher receiver dropped");
                }
            }
            Err(error) => {
                let _ = event_tx.send(WatcherEvent::Error(error.to_string()));
            }
        })
        .map_err(|error| {
            VfsError::Watcher(format!(
                "failed to create filesystem watcher for {}: {error}",
                root.display()
            ))
        })?;

    let (watch_target, recursive_mode) = if root.is_dir() {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        (root.to_path_buf(), mode)
    } else {
        (
            root.parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            RecursiveMode::NonRecursive,
        )
    };

    watcher
        .watch(&watch_target, recursive_mode)
        .map_err(|error| {
            VfsError::Watcher(format!(
                "failed to watch {}: {error}",
                watch_target.display()
            ))
        })?;

    log::debug!("watching {} ({recursive_mode:?})", watch_target.display());
    Ok(watcher)
}
