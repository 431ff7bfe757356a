//! Cached entry types for the snapshot tree.

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use thin_vec::ThinVec;

use super::index_types::{EntryId, OptionEntryId};
use crate::live::LiveAttributes;

bitflags! {
    /// Per-entry state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryFlags: u8 {
        /// The snapshot may be stale and must be re-verified.
        const DIRTY = 1 << 0;
        /// The entry was writable when last observed.
        const WRITABLE = 1 << 1;
    }
}

// ---------------------------------------------------------------------------
// Directory children
// ---------------------------------------------------------------------------

/// Cached children of a directory.
///
/// When `all_loaded` is set, `children` mirrors the full live listing and the
/// directory is refreshed by exact set difference. Otherwise only the cached
/// subset is checked, plus the suspicious names recorded since the last scan.
#[derive(Debug, Clone, Default)]
pub struct DirectoryChildren {
    children: ThinVec<EntryId>,
    all_loaded: bool,
    suspicious: Vec<Box<str>>,
}

impl DirectoryChildren {
    /// Children that mirror the complete live listing.
    pub fn loaded() -> Self {
        Self {
            all_loaded: true,
            ..Self::default()
        }
    }

    /// Children that are loaded lazily; none are cached yet.
    pub fn unloaded() -> Self {
        Self::default()
    }

    #[inline]
    pub fn all_loaded(&self) -> bool {
        self.all_loaded
    }

    pub(crate) fn set_all_loaded(&mut self, all_loaded: bool) {
        self.all_loaded = all_loaded;
    }

    #[inline]
    pub fn ids(&self) -> &[EntryId] {
        &self.children
    }

    #[inline]
    pub fn suspicious_names(&self) -> &[Box<str>] {
        &self.suspicious
    }

    pub(crate) fn add_child(&mut self, child: EntryId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: EntryId) -> bool {
        if let Some(pos) = self.children.iter().position(|&c| c == child) {
            self.children.remove(pos);
            true
        } else {
            false
        }
    }

    pub(crate) fn add_suspicious(&mut self, name: &str) {
        if !self.suspicious.iter().any(|existing| &**existing == name) {
            self.suspicious.push(name.into());
        }
    }

    pub(crate) fn take_suspicious(&mut self) -> Vec<Box<str>> {
        std::mem::take(&mut self.suspicious)
    }
}

// ---------------------------------------------------------------------------
// Entry kind
// ---------------------------------------------------------------------------

/// What a cached entry is, with the per-kind state the refresh needs.
#[derive(Debug, Clone)]
pub enum EntryKind {
    /// Regular file, possibly reached through a symlink.
    File { link_target: Option<PathBuf> },
    /// Device, socket, fifo or anything else that has no content to compare.
    SpecialFile,
    /// Plain directory.
    Directory(DirectoryChildren),
    /// Symlink resolving to a directory.
    SymlinkDirectory {
        target: PathBuf,
        children: DirectoryChildren,
    },
}

impl EntryKind {
    /// Derives the kind from a live snapshot. Directories start with
    /// `children` as their child state.
    pub fn from_attributes(attributes: &LiveAttributes, children: DirectoryChildren) -> Self {
        if attributes.is_directory {
            match (attributes.is_symlink, &attributes.symlink_target) {
                (true, Some(target)) => Self::SymlinkDirectory {
                    target: target.clone(),
                    children,
                },
                _ => Self::Directory(children),
            }
        } else if attributes.is_special {
            Self::SpecialFile
        } else {
            Self::File {
                link_target: attributes
                    .is_symlink
                    .then(|| attributes.symlink_target.clone())
                    .flatten(),
            }
        }
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_) | Self::SymlinkDirectory { .. })
    }

    #[inline]
    pub fn is_symlink(&self) -> bool {
        matches!(
            self,
            Self::SymlinkDirectory { .. }
                | Self::File {
                    link_target: Some(_)
                }
        )
    }

    #[inline]
    pub fn is_special(&self) -> bool {
        matches!(self, Self::SpecialFile)
    }

    pub fn symlink_target(&self) -> Option<&Path> {
        match self {
            Self::File { link_target } => link_target.as_deref(),
            Self::SymlinkDirectory { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&DirectoryChildren> {
        match self {
            Self::Directory(children) | Self::SymlinkDirectory { children, .. } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut DirectoryChildren> {
        match self {
            Self::Directory(children) | Self::SymlinkDirectory { children, .. } => Some(children),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// CachedEntry
// ---------------------------------------------------------------------------

/// A node in the in-memory filesystem mirror.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    name: Box<str>,
    parent: OptionEntryId,
    flags: EntryFlags,
    kind: EntryKind,
    /// Modification time in milliseconds since the Unix epoch.
    timestamp: u64,
    /// Length in bytes (`0` for directories).
    length: u64,
}

impl CachedEntry {
    /// Creates a clean entry from a live snapshot.
    pub fn new(
        parent: Option<EntryId>,
        name: &str,
        attributes: &LiveAttributes,
        children: DirectoryChildren,
    ) -> Self {
        let mut flags = EntryFlags::empty();
        flags.set(EntryFlags::WRITABLE, attributes.writable);
        Self {
            name: name.into(),
            parent: OptionEntryId::from_option(parent),
            flags,
            kind: EntryKind::from_attributes(attributes, children),
            timestamp: attributes.timestamp,
            length: attributes.length,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<EntryId> {
        self.parent.to_option()
    }

    #[inline]
    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    #[inline]
    pub(crate) fn kind_mut(&mut self) -> &mut EntryKind {
        &mut self.kind
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(EntryFlags::DIRTY)
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.flags.contains(EntryFlags::WRITABLE)
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.flags.set(EntryFlags::DIRTY, dirty);
    }

    pub(crate) fn set_writable(&mut self, writable: bool) {
        self.flags.set(EntryFlags::WRITABLE, writable);
    }

    pub(crate) fn set_content(&mut self, timestamp: u64, length: u64) {
        self.timestamp = timestamp;
        self.length = length;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_attributes() -> LiveAttributes {
        LiveAttributes {
            exists: true,
            timestamp: 1_700_000_000_000,
            length: 42,
            writable: true,
            ..LiveAttributes::default()
        }
    }

    #[test]
    fn kind_from_file_attributes() {
        let kind = EntryKind::from_attributes(&file_attributes(), DirectoryChildren::loaded());
        assert!(matches!(kind, EntryKind::File { link_target: None }));
        assert!(!kind.is_directory());
        assert!(!kind.is_symlink());
        assert!(kind.children().is_none());
    }

    #[test]
    fn kind_from_symlinked_directory() {
        let attributes = LiveAttributes {
            exists: true,
            is_directory: true,
            is_symlink: true,
            symlink_target: Some(PathBuf::from("/real/dir")),
            ..LiveAttributes::default()
        };
        let kind = EntryKind::from_attributes(&attributes, DirectoryChildren::unloaded());
        assert!(kind.is_directory());
        assert!(kind.is_symlink());
        assert_eq!(kind.symlink_target(), Some(Path::new("/real/dir")));
        assert!(!kind.children().expect("directory").all_loaded());
    }

    #[test]
    fn kind_from_special_file() {
        let attributes = LiveAttributes {
            exists: true,
            is_special: true,
            ..LiveAttributes::default()
        };
        let kind = EntryKind::from_attributes(&attributes, DirectoryChildren::loaded());
        assert!(kind.is_special());
    }

    #[test]
    fn new_entry_is_clean_and_copies_attributes() {
        let entry = CachedEntry::new(None, "a.txt", &file_attributes(), DirectoryChildren::loaded());
        assert_eq!(entry.name(), "a.txt");
        assert!(!entry.is_dirty());
        assert!(entry.is_writable());
        assert_eq!(entry.length(), 42);
        assert_eq!(entry.parent(), None);
    }

    #[test]
    fn suspicious_names_are_deduplicated_and_drained() {
        let mut children = DirectoryChildren::unloaded();
        children.add_suspicious("x");
        children.add_suspicious("x");
        children.add_suspicious("y");
        assert_eq!(children.suspicious_names().len(), 2);

        let taken = children.take_suspicious();
        assert_eq!(taken.len(), 2);
        assert!(children.suspicious_names().is_empty());
    }

    #[test]
    fn child_ids_are_unique() {
        let mut children = DirectoryChildren::loaded();
        let id = EntryId::new(3);
        children.add_child(id);
        children.add_child(id);
        assert_eq!(children.ids(), &[id]);
        assert!(children.remove_child(id));
        assert!(!children.remove_child(id));
    }
}
