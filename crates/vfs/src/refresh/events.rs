//! Change events produced by a refresh and their application to the tree.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VfsError};
use crate::live::{LiveAttributes, LiveFileSystem};
use crate::storage::{CachedTree, EntryId};

/// Entry attribute tracked by `ChangeEvent::AttributeChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryProperty {
    Writable,
}

/// One difference between the cached tree and the live filesystem.
///
/// Entry ids refer to the tree the events were produced from, as it was when
/// the scan finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A child named `name` appeared under `parent`. `re_create` is set when
    /// it replaces an entry of a different type deleted just before.
    Create {
        parent: EntryId,
        name: Box<str>,
        is_directory: bool,
        re_create: bool,
    },
    /// The entry and its subtree are gone.
    Delete { entry: EntryId },
    /// File timestamp or length changed.
    ContentChange { entry: EntryId },
    AttributeChange {
        entry: EntryId,
        property: EntryProperty,
        old_value: bool,
        new_value: bool,
    },
}

impl ChangeEvent {
    /// Absolute path the event concerns, resolved against `tree`.
    pub fn path(&self, tree: &CachedTree) -> Option<PathBuf> {
        match self {
            Self::Create { parent, name, .. } => {
                tree.path(*parent).map(|path| path.join(&**name))
            }
            Self::Delete { entry }
            | Self::ContentChange { entry }
            | Self::AttributeChange { entry, .. } => tree.path(*entry),
        }
    }
}

impl CachedTree {
    /// Folds a single event into the tree. Created entries are read from
    /// `fs` and start clean. Returns false when the event left the tree
    /// untouched, as for a created path that is already gone again.
    pub fn apply_event<F: LiveFileSystem + ?Sized>(
        &mut self,
        fs: &F,
        event: &ChangeEvent,
    ) -> Result<bool> {
        match event {
            ChangeEvent::Create { parent, name, .. } => {
                let path = self
                    .path(*parent)
                    .ok_or(VfsError::EntryNotFound(*parent))?
                    .join(&**name);
                let attributes = LiveAttributes::observe(fs, &path);
                if !attributes.exists {
                    log::debug!("{} vanished before it could be cached", path.display());
                    return Ok(false);
                }
                if let Some(existing) = self.find_child(*parent, name) {
                    self.remove_subtree(existing)?;
                }
                self.insert_child(*parent, name, &attributes)?;
            }
            ChangeEvent::Delete { entry } => {
                self.remove_subtree(*entry)?;
            }
            ChangeEvent::ContentChange { entry } => {
                let path = self.path(*entry).ok_or(VfsError::EntryNotFound(*entry))?;
                let timestamp = fs.timestamp(&path);
                let length = fs.length(&path);
                self.entry_mut(*entry)
                    .ok_or(VfsError::EntryNotFound(*entry))?
                    .set_content(timestamp, length);
            }
            ChangeEvent::AttributeChange {
                entry,
                property: EntryProperty::Writable,
                new_value,
                ..
            } => {
                let cached = self
                    .entry_mut(*entry)
                    .ok_or(VfsError::EntryNotFound(*entry))?;
                cached.set_writable(*new_value);
            }
        }
        Ok(true)
    }
}

/// Applies `events` in order, logging and skipping any that no longer fit the
/// tree. Returns the number that changed the tree.
pub fn apply_events<F: LiveFileSystem + ?Sized>(
    tree: &mut CachedTree,
    fs: &F,
    events: &[ChangeEvent],
) -> usize {
    let mut applied = 0;
    for event in events {
        match tree.apply_event(fs, event) {
            Ok(true) => applied += 1,
            Ok(false) => {}
            Err(error) => log::warn!("skipping {event:?}: {error}"),
        }
    }
    applied
}
