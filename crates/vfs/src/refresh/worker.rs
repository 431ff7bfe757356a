//! RefreshWorker - diffs dirty cached entries against the live filesystem.
//!
//! The worker walks the cached tree breadth first from one root. Clean
//! entries are skipped, dirty ones are compared with the live filesystem and
//! every difference is recorded as a `ChangeEvent`. The tree is not changed
//! structurally during a scan; only dirty flags are cleared and suspicious
//! names drained. Callers apply the events afterwards.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use fnv::FnvHashSet;

use super::events::{ChangeEvent, EntryProperty};
use super::session::RefreshSessionId;
use crate::config::RefreshOptions;
use crate::live::{LiveAttributes, LiveFileSystem};
use crate::storage::{CachedTree, DirectoryChildren, EntryId, EntryKind};

pub struct RefreshWorker<'a, F: LiveFileSystem + ?Sized> {
    tree: &'a mut CachedTree,
    fs: &'a F,
    root: EntryId,
    options: RefreshOptions,
    queue: VecDeque<EntryId>,
    events: Vec<ChangeEvent>,
    session: RefreshSessionId,
}

/// What the worker does with a popped entry.
enum Visit {
    Directory { all_loaded: bool },
    SymlinkDirectory { target: PathBuf, all_loaded: bool },
    File,
    SpecialFile,
}

impl<'a, F: LiveFileSystem + ?Sized> RefreshWorker<'a, F> {
    pub fn new(
        tree: &'a mut CachedTree,
        fs: &'a F,
        root: EntryId,
        options: RefreshOptions,
    ) -> Self {
        Self {
            tree,
            fs,
            root,
            options,
            queue: VecDeque::new(),
            events: Vec::new(),
            session: RefreshSessionId::next(),
        }
    }

    #[inline]
    pub fn session(&self) -> RefreshSessionId {
        self.session
    }

    /// Events recorded so far, in emission order.
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ChangeEvent> {
        self.events
    }

    /// Runs the scan to completion. Every visited dirty entry is marked clean.
    pub fn scan(&mut self) {
        log::debug!(
            "{}: scanning {} (recursive: {})",
            self.session,
            self.tree
                .path(self.root)
                .unwrap_or_default()
                .display(),
            self.options.recursive
        );

        self.queue.push_back(self.root);
        let mut visited = 0usize;
        while let Some(id) = self.queue.pop_front() {
            if !self.tree.is_dirty(id) {
                continue;
            }
            self.process(id);
            self.tree.mark_clean(id);
            visited += 1;
        }

        log::debug!(
            "{}: visited {visited} dirty entries, {} events",
            self.session,
            self.events.len()
        );
    }

    fn process(&mut self, id: EntryId) {
        let Some(path) = self.tree.path(id) else {
            log::warn!("{}: entry {id:?} is detached from the tree", self.session);
            return;
        };
        let Some(entry) = self.tree.entry(id) else {
            return;
        };
        let visit = match entry.kind() {
            EntryKind::Directory(children) => Visit::Directory {
                all_loaded: children.all_loaded(),
            },
            EntryKind::SymlinkDirectory { target, children } => Visit::SymlinkDirectory {
                target: target.clone(),
                all_loaded: children.all_loaded(),
            },
            EntryKind::File { .. } => Visit::File,
            EntryKind::SpecialFile => Visit::SpecialFile,
        };

        if id == self.root && !self.fs.exists(&path) {
            self.events.push(ChangeEvent::Delete { entry: id });
            return;
        }

        match visit {
            Visit::SymlinkDirectory { target, all_loaded } => {
                let live = LiveAttributes::observe(self.fs, &path);
                if !live.is_directory || live.symlink_target.as_deref() != Some(target.as_path())
                {
                    self.replace_symlink_directory(id, &live);
                    return;
                }
                self.sync_children(id, &path, all_loaded);
            }
            Visit::Directory { all_loaded } => self.sync_children(id, &path, all_loaded),
            Visit::File => self.check_content(id, &path),
            Visit::SpecialFile => {}
        }

        self.check_writable(id, &path);
    }

    /// The link now points somewhere else, or no longer at a directory.
    fn replace_symlink_directory(&mut self, id: EntryId, live: &LiveAttributes) {
        let Some(entry) = self.tree.entry(id) else {
            return;
        };
        let parent = entry.parent();
        let name: Box<str> = entry.name().into();

        self.events.push(ChangeEvent::Delete { entry: id });
        // A tree root has no parent to re-create under.
        if let Some(parent) = parent {
            self.events.push(ChangeEvent::Create {
                parent,
                name,
                is_directory: live.is_directory,
                re_create: true,
            });
        }
    }

    fn sync_children(&mut self, id: EntryId, path: &Path, all_loaded: bool) {
        if all_loaded {
            self.full_sync(id, path);
        } else {
            self.partial_sync(id, path);
        }
    }

    /// Exact set difference between the cached children and the live listing.
    fn full_sync(&mut self, id: EntryId, path: &Path) {
        let mut live_names: Vec<String> = self
            .fs
            .list(path)
            .into_iter()
            .filter(|name| !self.options.ignored.is_ignored(name))
            .collect();
        live_names.sort_unstable();
        live_names.dedup();
        let live_set: FnvHashSet<&str> = live_names.iter().map(String::as_str).collect();

        let cached = self.cached_children(id);
        let cached_set: FnvHashSet<&str> = cached.iter().map(|(_, name)| &**name).collect();

        let mut retained = Vec::with_capacity(cached.len());
        for (child, name) in &cached {
            if live_set.contains(&**name) {
                retained.push(*child);
            } else {
                self.events.push(ChangeEvent::Delete { entry: *child });
            }
        }

        for name in &live_names {
            if cached_set.contains(name.as_str()) {
                continue;
            }
            let is_directory = self.fs.is_directory(&path.join(name));
            self.events.push(ChangeEvent::Create {
                parent: id,
                name: name.as_str().into(),
                is_directory,
                re_create: false,
            });
        }

        for child in retained {
            self.check_child(id, child, path);
        }
    }

    /// Checks only the cached children plus the names recorded as suspicious.
    fn partial_sync(&mut self, id: EntryId, path: &Path) {
        for (child, name) in self.cached_children(id) {
            if self.fs.exists(&path.join(&*name)) {
                self.check_child(id, child, path);
            } else {
                self.events.push(ChangeEvent::Delete { entry: child });
            }
        }

        for name in self.tree.take_suspicious_names(id) {
            if self.options.ignored.is_ignored(&name) || self.tree.find_child(id, &name).is_some()
            {
                continue;
            }
            let child_path = path.join(&*name);
            if !self.fs.exists(&child_path) {
                continue;
            }
            let is_directory = self.fs.is_directory(&child_path);
            self.events.push(ChangeEvent::Create {
                parent: id,
                name,
                is_directory,
                re_create: false,
            });
        }
    }

    /// Compares a retained child's shape with the live one. A different type,
    /// link state or link target replaces the entry; otherwise the child is
    /// queued for its own visit.
    fn check_child(&mut self, parent: EntryId, child: EntryId, parent_path: &Path) {
        let Some(entry) = self.tree.entry(child) else {
            return;
        };
        let child_path = parent_path.join(entry.name());
        let live = LiveAttributes::observe(self.fs, &child_path);

        if !same_shape(entry.kind(), &live) {
            let name: Box<str> = entry.name().into();
            log::debug!(
                "{}: {} changed type, re-creating",
                self.session,
                child_path.display()
            );
            self.events.push(ChangeEvent::Delete { entry: child });
            self.events.push(ChangeEvent::Create {
                parent,
                name,
                is_directory: live.is_directory,
                re_create: true,
            });
            return;
        }

        if self.options.recursive || !entry.is_directory() {
            self.queue.push_back(child);
        }
    }

    fn check_content(&mut self, id: EntryId, path: &Path) {
        let Some(entry) = self.tree.entry(id) else {
            return;
        };
        let changed = entry.timestamp() != self.fs.timestamp(path)
            || (self.options.compare_length && entry.length() != self.fs.length(path));
        if changed {
            self.events.push(ChangeEvent::ContentChange { entry: id });
        }
    }

    fn check_writable(&mut self, id: EntryId, path: &Path) {
        let Some(entry) = self.tree.entry(id) else {
            return;
        };
        let old_value = entry.is_writable();
        let new_value = self.fs.is_writable(path);
        if old_value != new_value {
            self.events.push(ChangeEvent::AttributeChange {
                entry: id,
                property: EntryProperty::Writable,
                old_value,
                new_value,
            });
        }
    }

    fn cached_children(&self, id: EntryId) -> Vec<(EntryId, Box<str>)> {
        self.tree
            .children(id)
            .iter()
            .filter_map(|&child| {
                self.tree
                    .entry(child)
                    .map(|entry| (child, Box::<str>::from(entry.name())))
            })
            .collect()
    }
}

/// True if the live attributes would produce an entry of the same kind, link
/// state and link target as `cached`.
fn same_shape(cached: &EntryKind, live: &LiveAttributes) -> bool {
    let observed = EntryKind::from_attributes(live, DirectoryChildren::unloaded());
    cached.is_directory() == observed.is_directory()
        && cached.is_symlink() == observed.is_symlink()
        && cached.is_special() == observed.is_special()
        && cached.symlink_target() == observed.symlink_target()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IgnoredNames;
    use crate::live::MemoryFileSystem;
    use crate::refresh::apply_events;

    fn load(fs: &MemoryFileSystem) -> CachedTree {
        CachedTree::load(fs, "/root", &IgnoredNames::default()).expect("load")
    }

    fn id(tree: &CachedTree, path: &str) -> EntryId {
        tree.entry_for_path(Path::new(path)).expect(path)
    }

    fn scan(tree: &mut CachedTree, fs: &MemoryFileSystem, options: RefreshOptions) -> Vec<ChangeEvent> {
        let root = tree.root();
        let mut worker = RefreshWorker::new(tree, fs, root, options);
        worker.scan();
        worker.into_events()
    }

    fn create(parent: EntryId, name: &str, is_directory: bool, re_create: bool) -> ChangeEvent {
        ChangeEvent::Create {
            parent,
            name: name.into(),
            is_directory,
            re_create,
        }
    }

    #[test]
    fn clean_tree_produces_no_events() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 1);
        let mut tree = load(&fs);
        fs.remove("/root/a.txt");

        assert!(scan(&mut tree, &fs, RefreshOptions::default()).is_empty());
    }

    #[test]
    fn full_sync_reports_deleted_created_and_keeps_unchanged() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 10);
        fs.create_file("/root/b.txt", 2, 20);
        let mut tree = load(&fs);
        let root = tree.root();
        let a = id(&tree, "/root/a.txt");
        let b = id(&tree, "/root/b.txt");
        tree.mark_dirty(a);
        tree.mark_dirty(b);

        fs.remove("/root/a.txt");
        fs.create_file("/root/c.txt", 3, 30);

        let events = scan(&mut tree, &fs, RefreshOptions::default());
        assert_eq!(
            events,
            vec![
                ChangeEvent::Delete { entry: a },
                create(root, "c.txt", false, false)
            ]
        );
        assert!(!tree.is_dirty(b));
        assert!(!tree.is_dirty(root));
    }

    #[test]
    fn second_scan_is_quiet() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 10);
        fs.create_file("/root/sub/b.txt", 2, 20);
        let mut tree = load(&fs);
        let root = tree.root();
        tree.mark_dirty_recursively(root);
        fs.touch("/root/sub/b.txt", 5, 20);

        let first = scan(&mut tree, &fs, RefreshOptions::default());
        assert_eq!(
            first,
            vec![ChangeEvent::ContentChange {
                entry: id(&tree, "/root/sub/b.txt")
            }]
        );
        assert!(scan(&mut tree, &fs, RefreshOptions::default()).is_empty());
    }

    #[test]
    fn file_turned_directory_is_recreated() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/x", 1, 1);
        let mut tree = load(&fs);
        let root = tree.root();
        let x = id(&tree, "/root/x");
        tree.mark_dirty(x);

        fs.remove("/root/x");
        fs.create_dir("/root/x");

        let events = scan(&mut tree, &fs, RefreshOptions::default());
        assert_eq!(
            events,
            vec![
                ChangeEvent::Delete { entry: x },
                create(root, "x", true, true)
            ]
        );
    }

    #[test]
    fn content_change_uses_timestamp_and_length() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 10);
        let mut tree = load(&fs);
        let a = id(&tree, "/root/a.txt");

        fs.touch("/root/a.txt", 1, 11);
        tree.mark_dirty(a);
        let mut options = RefreshOptions::default();
        options.compare_length = false;
        assert!(scan(&mut tree, &fs, options).is_empty());

        tree.mark_dirty(a);
        assert_eq!(
            scan(&mut tree, &fs, RefreshOptions::default()),
            vec![ChangeEvent::ContentChange { entry: a }]
        );
    }

    #[test]
    fn writability_change_is_reported() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 10);
        let mut tree = load(&fs);
        let a = id(&tree, "/root/a.txt");

        fs.set_writable("/root/a.txt", false);
        tree.mark_dirty(a);
        assert_eq!(
            scan(&mut tree, &fs, RefreshOptions::default()),
            vec![ChangeEvent::AttributeChange {
                entry: a,
                property: EntryProperty::Writable,
                old_value: true,
                new_value: false,
            }]
        );
    }

    #[test]
    fn special_files_skip_content_checks() {
        let fs = MemoryFileSystem::new();
        fs.create_special("/root/fifo");
        let mut tree = load(&fs);
        let fifo = id(&tree, "/root/fifo");
        assert!(tree.entry(fifo).expect("fifo").kind().is_special());

        fs.touch("/root/fifo", 42, 42);
        tree.mark_dirty(fifo);
        assert!(scan(&mut tree, &fs, RefreshOptions::default()).is_empty());
    }

    #[test]
    fn deleted_root_is_reported_once() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 10);
        let mut tree = load(&fs);
        let root = tree.root();
        tree.mark_dirty_recursively(root);
        fs.remove("/root");

        assert_eq!(
            scan(&mut tree, &fs, RefreshOptions::default()),
            vec![ChangeEvent::Delete { entry: root }]
        );
        assert!(!tree.is_dirty(root));
    }

    #[test]
    fn partial_sync_checks_cached_children_and_suspicious_names() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 1);
        fs.create_file("/root/b.txt", 1, 1);
        fs.create_file("/root/c.txt", 1, 1);
        let attributes = LiveAttributes::observe(&fs, Path::new("/root"));
        let mut tree = CachedTree::new("/root", &attributes);
        let root = tree.root();
        let a = tree
            .insert_child(root, "a.txt", &LiveAttributes::observe(&fs, Path::new("/root/a.txt")))
            .expect("insert");

        fs.remove("/root/a.txt");
        tree.add_suspicious_name(root, "c.txt");
        tree.add_suspicious_name(root, "missing.txt");
        tree.mark_dirty(root);

        let events = scan(&mut tree, &fs, RefreshOptions::default());
        // b.txt is neither cached nor suspicious, so it stays unseen.
        assert_eq!(
            events,
            vec![
                ChangeEvent::Delete { entry: a },
                create(root, "c.txt", false, false)
            ]
        );
        assert!(tree
            .entry(root)
            .and_then(|entry| entry.kind().children())
            .expect("children")
            .suspicious_names()
            .is_empty());
    }

    #[test]
    fn ignored_names_are_never_created() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 1);
        let mut tree = load(&fs);
        let root = tree.root();
        fs.create_dir("/root/.git");
        fs.create_file("/root/b.txt", 1, 1);
        tree.mark_dirty(root);

        let mut options = RefreshOptions::default();
        options.ignored = IgnoredNames::new([".git".to_string()]);
        assert_eq!(
            scan(&mut tree, &fs, options),
            vec![create(root, "b.txt", false, false)]
        );
    }

    #[test]
    fn non_recursive_scan_stays_at_top_level() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 1);
        fs.create_file("/root/sub/b.txt", 1, 1);
        let mut tree = load(&fs);
        let root = tree.root();
        let a = id(&tree, "/root/a.txt");
        let sub = id(&tree, "/root/sub");
        tree.mark_dirty_recursively(root);
        fs.touch("/root/a.txt", 2, 1);
        fs.touch("/root/sub/b.txt", 2, 1);

        let events = scan(&mut tree, &fs, RefreshOptions::default().recursive(false));
        assert_eq!(events, vec![ChangeEvent::ContentChange { entry: a }]);
        assert!(tree.is_dirty(sub));
    }

    #[test]
    fn retargeted_symlink_directory_is_recreated() {
        let fs = MemoryFileSystem::new();
        fs.create_dir("/root");
        fs.create_symlink_dir("/root/link", "/target/one");
        let mut tree = load(&fs);
        let root = tree.root();
        let link = id(&tree, "/root/link");

        fs.create_symlink_dir("/root/link", "/target/two");
        tree.mark_dirty(link);

        assert_eq!(
            scan(&mut tree, &fs, RefreshOptions::default()),
            vec![
                ChangeEvent::Delete { entry: link },
                create(root, "link", true, true)
            ]
        );
    }

    #[test]
    fn retargeted_symlink_file_is_recreated() {
        let fs = MemoryFileSystem::new();
        fs.create_dir("/root");
        fs.create_symlink_file("/root/current", "/releases/v1");
        let mut tree = load(&fs);
        let root = tree.root();
        let current = id(&tree, "/root/current");
        assert_eq!(
            tree.entry(current).expect("current").kind().symlink_target(),
            Some(Path::new("/releases/v1"))
        );

        fs.create_symlink_file("/root/current", "/releases/v2");
        tree.mark_dirty(current);

        assert_eq!(
            scan(&mut tree, &fs, RefreshOptions::default()),
            vec![
                ChangeEvent::Delete { entry: current },
                create(root, "current", false, true)
            ]
        );
    }

    #[test]
    fn retargeted_symlink_root_is_only_deleted() {
        let fs = MemoryFileSystem::new();
        fs.create_symlink_dir("/link", "/target/one");
        let attributes = LiveAttributes::observe(&fs, Path::new("/link"));
        let mut tree = CachedTree::new("/link", &attributes);
        let root = tree.root();

        fs.create_symlink_dir("/link", "/target/two");
        tree.mark_dirty(root);

        assert_eq!(
            scan(&mut tree, &fs, RefreshOptions::default()),
            vec![ChangeEvent::Delete { entry: root }]
        );
    }

    #[test]
    fn applying_events_converges_to_live_state() {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 1);
        fs.create_file("/root/sub/b.txt", 1, 1);
        let mut tree = load(&fs);
        let root = tree.root();

        fs.remove("/root/a.txt");
        fs.create_file("/root/sub/c.txt", 1, 1);
        fs.touch("/root/sub/b.txt", 9, 9);
        tree.mark_dirty_recursively(root);

        let events = scan(&mut tree, &fs, RefreshOptions::default());
        apply_events(&mut tree, &fs, &events);

        assert!(tree.entry_for_path(Path::new("/root/a.txt")).is_none());
        assert!(tree.entry_for_path(Path::new("/root/sub/c.txt")).is_some());
        let b = id(&tree, "/root/sub/b.txt");
        assert_eq!(tree.entry(b).expect("b").timestamp(), 9);

        tree.mark_dirty_recursively(root);
        assert!(scan(&mut tree, &fs, RefreshOptions::default()).is_empty());
    }
}
