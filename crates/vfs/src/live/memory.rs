//! In-memory live filesystem.
//!
//! Useful for tests and for embedders that mirror a non-disk tree. Paths are
//! stored as given; parents are created implicitly as directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::LiveFileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoryKind {
    File,
    Directory,
    Special,
}

#[derive(Debug, Clone)]
struct MemoryNode {
    kind: MemoryKind,
    timestamp: u64,
    length: u64,
    writable: bool,
    link_target: Option<PathBuf>,
}

impl MemoryNode {
    fn new(kind: MemoryKind) -> Self {
        Self {
            kind,
            timestamp: 0,
            length: 0,
            writable: true,
            link_target: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    nodes: RwLock<BTreeMap<PathBuf, MemoryNode>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, path: &Path, node: MemoryNode) {
        let mut nodes = self.nodes.write();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            nodes
                .entry(ancestor.to_path_buf())
                .or_insert_with(|| MemoryNode::new(MemoryKind::Directory));
        }
        nodes.insert(path.to_path_buf(), node);
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MemoryNode::new(MemoryKind::Directory));
    }

    pub fn create_file(&self, path: impl AsRef<Path>, timestamp: u64, length: u64) {
        let mut node = MemoryNode::new(MemoryKind::File);
        node.timestamp = timestamp;
        node.length = length;
        self.insert(path.as_ref(), node);
    }

    pub fn create_special(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MemoryNode::new(MemoryKind::Special));
    }

    /// Creates a symlink at `path` that resolves to a directory at `target`.
    pub fn create_symlink_dir(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        let mut node = MemoryNode::new(MemoryKind::Directory);
        node.link_target = Some(target.into());
        self.insert(path.as_ref(), node);
    }

    /// Creates a symlink at `path` that resolves to a regular file at `target`.
    pub fn create_symlink_file(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        let mut node = MemoryNode::new(MemoryKind::File);
        node.link_target = Some(target.into());
        self.insert(path.as_ref(), node);
    }

    /// Updates a file's modification time and length.
    pub fn touch(&self, path: impl AsRef<Path>, timestamp: u64, length: u64) {
        if let Some(node) = self.nodes.write().get_mut(path.as_ref()) {
            node.timestamp = timestamp;
            node.length = length;
        }
    }

    pub fn set_writable(&self, path: impl AsRef<Path>, writable: bool) {
        if let Some(node) = self.nodes.write().get_mut(path.as_ref()) {
            node.writable = writable;
        }
    }

    /// Removes `path` and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes
            .write()
            .retain(|candidate, _| !candidate.starts_with(path));
    }

    fn with_node<T>(&self, path: &Path, f: impl FnOnce(&MemoryNode) -> T) -> Option<T> {
        self.nodes.read().get(path).map(f)
    }
}

impl LiveFileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.nodes.read().contains_key(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.with_node(path, |node| node.kind == MemoryKind::Directory)
            .unwrap_or(false)
    }

    fn list(&self, path: &Path) -> Vec<String> {
        self.nodes
            .read()
            .keys()
            .filter(|candidate| candidate.parent() == Some(path))
            .filter_map(|candidate| candidate.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }

    fn timestamp(&self, path: &Path) -> u64 {
        self.with_node(path, |node| node.timestamp).unwrap_or(0)
    }

    fn length(&self, path: &Path) -> u64 {
        self.with_node(path, |node| node.length).unwrap_or(0)
    }

    fn is_writable(&self, path: &Path) -> bool {
        self.with_node(path, |node| node.writable).unwrap_or(false)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.with_node(path, |node| node.link_target.is_some())
            .unwrap_or(false)
    }

    fn resolve_symlink(&self, path: &Path) -> Option<PathBuf> {
        self.with_node(path, |node| node.link_target.clone())
            .flatten()
    }

    fn is_special_file(&self, path: &Path) -> bool {
        self.with_node(path, |node| node.kind == MemoryKind::Special)
            .unwrap_or(false)
    }
}
