//! CachedTree - rooted snapshot tree over the entry arena.
//!
//! The tree owns every `CachedEntry` and the id of its root. Paths are never
//! stored: an entry's path is rebuilt from the root path and the names along
//! its parent chain.

use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

use super::index_types::EntryId;
use super::node::{CachedEntry, DirectoryChildren};
use super::slab::Slab;
use crate::config::IgnoredNames;
use crate::error::{Result, VfsError};
use crate::live::{LiveAttributes, LiveFileSystem};

#[derive(Debug)]
pub struct CachedTree {
    /// Absolute path of the root entry.
    root_path: PathBuf,
    slab: Slab<CachedEntry>,
    /// Index of the root entry, or `EntryId::INVALID` once it was removed.
    root: EntryId,
}

impl CachedTree {
    /// Creates a tree holding only the root entry. A directory root starts
    /// with unloaded children.
    pub fn new(root_path: impl Into<PathBuf>, attributes: &LiveAttributes) -> Self {
        let root_path = root_path.into();
        let name = root_name(&root_path);
        let mut slab = Slab::new();
        let root = slab.insert(CachedEntry::new(
            None,
            &name,
            attributes,
            DirectoryChildren::unloaded(),
        ));
        Self {
            root_path,
            slab,
            root,
        }
    }

    /// Walks the live tree below `root_path` and caches all of it.
    ///
    /// Every directory is fully loaded except symlinked ones, which are cached
    /// without children so link cycles are never followed.
    pub fn load<F: LiveFileSystem + ?Sized>(
        fs: &F,
        root_path: impl Into<PathBuf>,
        ignored: &IgnoredNames,
    ) -> Result<Self> {
        let root_path = root_path.into();
        let attributes = LiveAttributes::observe(fs, &root_path);
        if !attributes.exists {
            return Err(VfsError::PathNotFound(root_path));
        }

        let mut tree = Self::new(root_path, &attributes);
        let mut queue = VecDeque::from([tree.root]);
        while let Some(id) = queue.pop_front() {
            let expand = tree
                .entry(id)
                .is_some_and(|entry| entry.is_directory() && !entry.kind().is_symlink());
            if !expand {
                continue;
            }
            tree.load_children(fs, id, ignored)?;
            queue.extend(tree.children(id).iter().copied());
        }

        log::debug!(
            "loaded {} entries below {}",
            tree.len(),
            tree.root_path.display()
        );
        Ok(tree)
    }

    #[inline]
    pub fn root(&self) -> EntryId {
        self.root
    }

    #[inline]
    pub fn has_root(&self) -> bool {
        self.root != EntryId::INVALID
    }

    #[inline]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    #[inline]
    pub fn entry(&self, id: EntryId) -> Option<&CachedEntry> {
        self.slab.get(id)
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, id: EntryId) -> Option<&mut CachedEntry> {
        self.slab.get_mut(id)
    }

    /// Rebuilds the absolute path of an entry from its parent chain.
    pub fn path(&self, id: EntryId) -> Option<PathBuf> {
        let mut current = id;
        let mut names = Vec::new();
        loop {
            let entry = self.slab.get(current)?;
            match entry.parent() {
                Some(parent) => {
                    names.push(entry.name());
                    current = parent;
                }
                None if current == self.root => break,
                // Detached chain
                None => return None,
            }
        }

        let mut path = self.root_path.clone();
        path.extend(names.into_iter().rev());
        Some(path)
    }

    /// Locates the entry cached for `path`, which must lie under the root.
    pub fn entry_for_path(&self, path: &Path) -> Option<EntryId> {
        if !self.has_root() {
            return None;
        }
        let relative = path.strip_prefix(&self.root_path).ok()?;

        let mut current = self.root;
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    current = self.find_child(current, name.to_str()?)?;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn find_child(&self, parent: EntryId, name: &str) -> Option<EntryId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.slab.get(child).is_some_and(|entry| entry.name() == name))
    }

    /// Cached children of a directory; empty for anything else.
    pub fn children(&self, id: EntryId) -> &[EntryId] {
        self.slab
            .get(id)
            .and_then(|entry| entry.kind().children())
            .map(DirectoryChildren::ids)
            .unwrap_or(&[])
    }

    /// Returns all descendants of an entry, depth first.
    pub fn all_subnodes(&self, id: EntryId) -> Vec<EntryId> {
        let mut result = Vec::new();
        let mut stack: Vec<EntryId> = self.children(id).to_vec();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().copied());
        }
        result
    }

    // -----------------------------------------------------------------------
    // Structural mutation
    // -----------------------------------------------------------------------

    /// Adds a clean child built from `attributes`. A directory child starts
    /// with unloaded children.
    pub fn insert_child(
        &mut self,
        parent: EntryId,
        name: &str,
        attributes: &LiveAttributes,
    ) -> Result<EntryId> {
        let parent_entry = self
            .slab
            .get(parent)
            .ok_or(VfsError::EntryNotFound(parent))?;
        if !parent_entry.is_directory() {
            return Err(VfsError::NotADirectory(self.path_or_name(parent)));
        }
        if self.find_child(parent, name).is_some() {
            return Err(VfsError::AlreadyExists(self.path_or_name(parent).join(name)));
        }

        let child = self.slab.insert(CachedEntry::new(
            Some(parent),
            name,
            attributes,
            DirectoryChildren::unloaded(),
        ));
        if let Some(children) = self.slab[parent].kind_mut().children_mut() {
            children.add_child(child);
        }
        Ok(child)
    }

    /// Removes an entry with all of its descendants and returns how many
    /// entries were dropped. Removing the root leaves the tree rootless.
    pub fn remove_subtree(&mut self, id: EntryId) -> Result<usize> {
        let entry = self.slab.get(id).ok_or(VfsError::EntryNotFound(id))?;
        if let Some(parent) = entry.parent() {
            if let Some(children) = self
                .slab
                .get_mut(parent)
                .and_then(|parent| parent.kind_mut().children_mut())
            {
                children.remove_child(id);
            }
        }

        let mut removed = 0;
        for node in self.all_subnodes(id).into_iter().chain(std::iter::once(id)) {
            if self.slab.try_remove(node).is_some() {
                removed += 1;
            }
        }
        if id == self.root {
            self.root = EntryId::INVALID;
        }
        Ok(removed)
    }

    /// Caches every live child of a directory that is not cached yet and
    /// switches it to full-sync. Returns the number of entries added.
    pub fn load_children<F: LiveFileSystem + ?Sized>(
        &mut self,
        fs: &F,
        id: EntryId,
        ignored: &IgnoredNames,
    ) -> Result<usize> {
        let path = self.path(id).ok_or(VfsError::EntryNotFound(id))?;
        if !self.slab[id].is_directory() {
            return Err(VfsError::NotADirectory(path));
        }

        let mut names = fs.list(&path);
        names.sort_unstable();
        names.dedup();

        let mut added = 0;
        for name in names {
            if ignored.is_ignored(&name) || self.find_child(id, &name).is_some() {
                continue;
            }
            let attributes = LiveAttributes::observe(fs, &path.join(&name));
            if !attributes.exists {
                continue;
            }
            self.insert_child(id, &name, &attributes)?;
            added += 1;
        }

        if let Some(children) = self.slab[id].kind_mut().children_mut() {
            children.set_all_loaded(true);
        }
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // Dirty flags
    // -----------------------------------------------------------------------

    #[inline]
    pub fn is_dirty(&self, id: EntryId) -> bool {
        self.slab.get(id).is_some_and(CachedEntry::is_dirty)
    }

    pub fn mark_clean(&mut self, id: EntryId) {
        if let Some(entry) = self.slab.get_mut(id) {
            entry.set_dirty(false);
        }
    }

    /// Marks an entry and all of its ancestors dirty, so a refresh starting
    /// at any ancestor reaches it.
    pub fn mark_dirty(&mut self, id: EntryId) {
        let mut current = Some(id);
        while let Some(node) = current {
            let Some(entry) = self.slab.get_mut(node) else {
                break;
            };
            entry.set_dirty(true);
            current = entry.parent();
        }
    }

    /// Marks an entry, its ancestors and every descendant dirty.
    pub fn mark_dirty_recursively(&mut self, id: EntryId) {
        self.mark_dirty(id);
        for node in self.all_subnodes(id) {
            if let Some(entry) = self.slab.get_mut(node) {
                entry.set_dirty(true);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Suspicious names
    // -----------------------------------------------------------------------

    /// Records a name that may have appeared under a partially loaded
    /// directory. Returns false if `id` is not a directory.
    pub fn add_suspicious_name(&mut self, id: EntryId, name: &str) -> bool {
        match self
            .slab
            .get_mut(id)
            .and_then(|entry| entry.kind_mut().children_mut())
        {
            Some(children) => {
                children.add_suspicious(name);
                true
            }
            None => false,
        }
    }

    pub fn take_suspicious_names(&mut self, id: EntryId) -> Vec<Box<str>> {
        self.slab
            .get_mut(id)
            .and_then(|entry| entry.kind_mut().children_mut())
            .map(DirectoryChildren::take_suspicious)
            .unwrap_or_default()
    }

    fn path_or_name(&self, id: EntryId) -> PathBuf {
        self.path(id).unwrap_or_else(|| {
            self.slab
                .get(id)
                .map(|entry| PathBuf::from(entry.name()))
                .unwrap_or_default()
        })
    }
}

fn root_name(root_path: &Path) -> String {
    root_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
