//! VfsService - single owner of the cached tree.
//!
//! The service holds the tree behind a `RwLock`. Readers take the read lock;
//! a refresh takes the write lock for the whole scan, then applies the events
//! it produced before releasing it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::config::VfsConfig;
use crate::error::{Result, VfsError};
use crate::live::LiveFileSystem;
use crate::refresh::{
    apply_events, mark_paths_dirty, mark_subtrees_dirty, ChangeEvent, RefreshSessionId,
    RefreshWorker,
};
use crate::storage::CachedTree;
use crate::watcher::{create_watcher, WatcherEvent};

/// Result of one refresh.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub session: RefreshSessionId,
    pub events: Vec<ChangeEvent>,
}

pub struct VfsService {
    tree: RwLock<CachedTree>,
    fs: Arc<dyn LiveFileSystem + Send + Sync>,
    config: VfsConfig,
}

impl VfsService {
    pub fn new(tree: CachedTree, fs: Arc<dyn LiveFileSystem + Send + Sync>, config: VfsConfig) -> Self {
        Self {
            tree: RwLock::new(tree),
            fs,
            config,
        }
    }

    /// Loads a full snapshot of `root` and wraps it in a service.
    pub fn open(
        fs: Arc<dyn LiveFileSystem + Send + Sync>,
        root: impl Into<PathBuf>,
        config: VfsConfig,
    ) -> Result<Self> {
        let tree = CachedTree::load(&*fs, root, &config.ignored())?;
        Ok(Self::new(tree, fs, config))
    }

    #[inline]
    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    pub fn root_path(&self) -> PathBuf {
        self.tree.read().root_path().to_path_buf()
    }

    /// Read access to the cached tree.
    pub fn tree(&self) -> RwLockReadGuard<'_, CachedTree> {
        self.tree.read()
    }

    /// Brings the subtree at `path` in sync with the live filesystem.
    pub fn refresh(&self, path: &Path, recursive: bool) -> Result<RefreshOutcome> {
        let mut tree = self.tree.write();
        let root = tree
            .entry_for_path(path)
            .ok_or_else(|| VfsError::PathNotFound(path.to_path_buf()))?;
        let options = self.config.refresh_options().recursive(recursive);

        let mut worker = RefreshWorker::new(&mut tree, &*self.fs, root, options);
        worker.scan();
        let session = worker.session();
        let events = worker.into_events();

        let applied = apply_events(&mut tree, &*self.fs, &events);
        log::debug!(
            "{session}: applied {applied}/{} events under {}",
            events.len(),
            path.display()
        );
        Ok(RefreshOutcome { session, events })
    }

    /// Refreshes from the root with the configured recursion.
    pub fn refresh_all(&self) -> Result<RefreshOutcome> {
        let root = self.root_path();
        self.refresh(&root, self.config.recursive)
    }

    /// Marks entries dirty for one watcher event. Returns how many paths or
    /// subtrees were marked.
    pub fn handle_watcher_event(&self, event: WatcherEvent) -> usize {
        let mut tree = self.tree.write();
        match event {
            WatcherEvent::PathsChanged(paths) => mark_paths_dirty(&mut tree, paths),
            WatcherEvent::RescanRequired(paths) if paths.is_empty() => {
                if !tree.has_root() {
                    return 0;
                }
                let root = tree.root();
                tree.mark_dirty_recursively(root);
                1
            }
            WatcherEvent::RescanRequired(paths) => mark_subtrees_dirty(&mut tree, paths),
            WatcherEvent::Error(error) => {
                log::warn!("filesystem watcher error: {error}");
                0
            }
        }
    }

    /// Applies every event currently queued on `receiver` without blocking.
    pub fn drain_watcher(&self, receiver: &Receiver<WatcherEvent>) -> usize {
        receiver
            .try_iter()
            .map(|event| self.handle_watcher_event(event))
            .sum()
    }

    /// Starts a watcher on the root when the configuration asks for one.
    pub fn start_watcher(
        &self,
    ) -> Result<Option<(notify::RecommendedWatcher, Receiver<WatcherEvent>)>> {
        if !self.config.watch {
            return Ok(None);
        }
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let watcher = create_watcher(&self.root_path(), self.config.recursive, event_tx)?;
        Ok(Some((watcher, event_rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::{LocalFileSystem, MemoryFileSystem};

    fn memory_service() -> (Arc<MemoryFileSystem>, VfsService) {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.create_file("/root/a.txt", 1, 1);
        fs.create_file("/root/sub/b.txt", 1, 1);
        let service =
            VfsService::open(fs.clone(), "/root", VfsConfig::default()).expect("open");
        (fs, service)
    }

    #[test]
    fn refresh_after_watcher_event_updates_tree() {
        let (fs, service) = memory_service();
        fs.create_file("/root/sub/c.txt", 2, 2);

        let marked = service.handle_watcher_event(WatcherEvent::PathsChanged(vec![
            PathBuf::from("/root/sub/c.txt"),
        ]));
        assert_eq!(marked, 1);

        let outcome = service.refresh_all().expect("refresh");
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(
            &outcome.events[0],
            ChangeEvent::Create { name, is_directory: false, .. } if &**name == "c.txt"
        ));
        assert!(service
            .tree()
            .entry_for_path(Path::new("/root/sub/c.txt"))
            .is_some());
    }

    #[test]
    fn rescan_marks_everything_dirty() {
        let (fs, service) = memory_service();
        fs.touch("/root/sub/b.txt", 7, 1);

        assert_eq!(
            service.handle_watcher_event(WatcherEvent::RescanRequired(Vec::new())),
            1
        );
        let outcome = service.refresh_all().expect("refresh");
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(outcome.events[0], ChangeEvent::ContentChange { .. }));
    }

    #[test]
    fn refresh_of_unknown_path_fails() {
        let (_fs, service) = memory_service();
        let result = service.refresh(Path::new("/root/missing"), true);
        assert!(matches!(result, Err(VfsError::PathNotFound(_))));
    }

    #[test]
    fn sessions_differ_between_refreshes() {
        let (_fs, service) = memory_service();
        let first = service.refresh_all().expect("refresh");
        let second = service.refresh_all().expect("refresh");
        assert_ne!(first.session, second.session);
        assert!(second.events.is_empty());
    }

    #[test]
    fn drain_watcher_consumes_queued_events() {
        let (fs, service) = memory_service();
        fs.remove("/root/a.txt");
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(WatcherEvent::PathsChanged(vec![PathBuf::from("/root/a.txt")]))
            .expect("send");
        tx.send(WatcherEvent::Error("overflow".to_string()))
            .expect("send");

        assert_eq!(service.drain_watcher(&rx), 1);
        assert!(rx.is_empty());
        let outcome = service.refresh_all().expect("refresh");
        assert!(matches!(outcome.events.as_slice(), [ChangeEvent::Delete { .. }]));
    }

    #[test]
    fn watcher_is_off_by_default() {
        let (_fs, service) = memory_service();
        assert!(service.start_watcher().expect("start").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_converges_after_one_refresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), b"a").expect("write");
        let service = VfsService::open(
            Arc::new(LocalFileSystem::new()),
            dir.path(),
            VfsConfig::default(),
        )
        .expect("open");
        assert!(service
            .tree()
            .entry_for_path(&dir.path().join("a.txt"))
            .is_some());

        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling"))
            .expect("symlink");
        service.handle_watcher_event(WatcherEvent::RescanRequired(Vec::new()));
        let first = service.refresh_all().expect("refresh");
        assert_eq!(first.events.len(), 1);
        assert!(service
            .tree()
            .entry_for_path(&dir.path().join("dangling"))
            .is_some());

        service.handle_watcher_event(WatcherEvent::RescanRequired(Vec::new()));
        let second = service.refresh_all().expect("refresh");
        assert!(second.events.is_empty(), "{:?}", second.events);
    }

    #[test]
    fn local_disk_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), b"a").expect("write");
        let service = VfsService::open(
            Arc::new(LocalFileSystem::new()),
            dir.path(),
            VfsConfig::default(),
        )
        .expect("open");

        std::fs::write(dir.path().join("b.txt"), b"b").expect("write");
        std::fs::remove_file(dir.path().join("a.txt")).expect("remove");
        service.handle_watcher_event(WatcherEvent::RescanRequired(Vec::new()));

        let outcome = service.refresh_all().expect("refresh");
        assert_eq!(outcome.events.len(), 2);
        let tree = service.tree();
        assert!(tree.entry_for_path(&dir.path().join("a.txt")).is_none());
        assert!(tree.entry_for_path(&dir.path().join("b.txt")).is_some());
    }
}
