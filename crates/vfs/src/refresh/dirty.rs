//! Turning changed paths into dirty entries.

use std::path::{Component, Path, PathBuf};

use fnv::FnvHashSet;

use crate::storage::{CachedTree, EntryId};

/// Marks the entry for each changed path dirty, along with its ancestors.
///
/// A path with no cached entry marks its deepest cached ancestor instead. If
/// that ancestor is a partially loaded directory, the first missing name is
/// recorded as suspicious so the next partial sync checks it. Paths outside
/// the tree are ignored. Returns the number of paths that landed in the tree.
pub fn mark_paths_dirty<I>(tree: &mut CachedTree, paths: I) -> usize
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut paths: Vec<PathBuf> = paths.into_iter().collect();
    paths.sort_unstable();
    paths.dedup();

    let mut marked = 0;
    for path in paths {
        let Some(target) = resolve_changed_path(tree, &path) else {
            continue;
        };
        tree.mark_dirty(target);
        marked += 1;
    }
    marked
}

/// Marks whole subtrees dirty, for watcher batches that ask for a rescan.
///
/// Paths are first reduced to their minimal ancestor cover. Returns the
/// number of subtrees marked.
pub fn mark_subtrees_dirty<I>(tree: &mut CachedTree, paths: I) -> usize
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut marked = 0;
    for path in subtree_cover(paths.into_iter().collect()) {
        let Some(target) = resolve_changed_path(tree, &path) else {
            continue;
        };
        tree.mark_dirty_recursively(target);
        marked += 1;
    }
    marked
}

/// Finds the entry a changed path should dirty, recording a suspicious name
/// when the path itself is not cached.
fn resolve_changed_path(tree: &mut CachedTree, path: &Path) -> Option<EntryId> {
    if !tree.has_root() || !path_in_scope(tree, path) {
        log::debug!("ignoring change outside the tree: {}", path.display());
        return None;
    }
    if let Some(id) = tree.entry_for_path(path) {
        return Some(id);
    }

    let (ancestor, ancestor_path) = path
        .ancestors()
        .skip(1)
        .find_map(|ancestor| tree.entry_for_path(ancestor).map(|id| (id, ancestor)))?;
    let missing = path
        .strip_prefix(ancestor_path)
        .ok()
        .and_then(|rest| match rest.components().next() {
            Some(Component::Normal(name)) => name.to_str(),
            _ => None,
        });

    let partially_loaded = tree
        .entry(ancestor)
        .and_then(|entry| entry.kind().children())
        .is_some_and(|children| !children.all_loaded());
    if let (true, Some(name)) = (partially_loaded, missing) {
        tree.add_suspicious_name(ancestor, name);
    }
    Some(ancestor)
}

/// Checks if a path is within the tree.
fn path_in_scope(tree: &CachedTree, candidate: &Path) -> bool {
    let root = tree.root_path();
    let root_is_dir = tree
        .entry(tree.root())
        .is_some_and(|entry| entry.is_directory());
    if root_is_dir {
        candidate.starts_with(root)
    } else {
        candidate == root
    }
}

/// Reduces rescan paths to the shallowest ones: a path is dropped when it
/// repeats, or lies inside, a path that is kept. Output is ordered by depth,
/// then by path.
fn subtree_cover(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort_by_cached_key(|path| (path.components().count(), path.clone()));
    paths.dedup();

    let mut kept: FnvHashSet<PathBuf> = FnvHashSet::default();
    paths.retain(|path| {
        if path.ancestors().any(|ancestor| kept.contains(ancestor)) {
            return false;
        }
        kept.insert(path.clone());
        true
    });
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IgnoredNames;
    use crate::live::{LiveAttributes, MemoryFileSystem};

    fn sample_tree() -> CachedTree {
        let fs = MemoryFileSystem::new();
        fs.create_file("/root/a.txt", 1, 1);
        fs.create_file("/root/src/main.rs", 1, 1);
        fs.create_file("/root/src/lib.rs", 1, 1);
        CachedTree::load(&fs, "/root", &IgnoredNames::default()).expect("load")
    }

    fn id(tree: &CachedTree, path: &str) -> EntryId {
        tree.entry_for_path(Path::new(path)).expect(path)
    }

    #[test]
    fn cached_path_and_ancestors_become_dirty() {
        let mut tree = sample_tree();
        let marked = mark_paths_dirty(
            &mut tree,
            [PathBuf::from("/root/src/main.rs"), PathBuf::from("/root/src/main.rs")],
        );

        assert_eq!(marked, 1);
        assert!(tree.is_dirty(id(&tree, "/root/src/main.rs")));
        assert!(tree.is_dirty(id(&tree, "/root/src")));
        assert!(tree.is_dirty(tree.root()));
        assert!(!tree.is_dirty(id(&tree, "/root/src/lib.rs")));
        assert!(!tree.is_dirty(id(&tree, "/root/a.txt")));
    }

    #[test]
    fn paths_outside_the_tree_are_ignored() {
        let mut tree = sample_tree();
        assert_eq!(mark_paths_dirty(&mut tree, [PathBuf::from("/other/file")]), 0);
        assert!(!tree.is_dirty(tree.root()));
    }

    #[test]
    fn unknown_path_dirties_loaded_parent_without_suspicion() {
        let mut tree = sample_tree();
        assert_eq!(mark_paths_dirty(&mut tree, [PathBuf::from("/root/src/new.rs")]), 1);

        let src = id(&tree, "/root/src");
        assert!(tree.is_dirty(src));
        assert!(tree
            .entry(src)
            .and_then(|entry| entry.kind().children())
            .expect("children")
            .suspicious_names()
            .is_empty());
    }

    #[test]
    fn unknown_path_under_partial_directory_is_suspicious() {
        let fs = MemoryFileSystem::new();
        fs.create_dir("/root");
        let attributes = LiveAttributes::observe(&fs, Path::new("/root"));
        let mut tree = CachedTree::new("/root", &attributes);

        mark_paths_dirty(&mut tree, [PathBuf::from("/root/deep/inside/file.txt")]);

        let root = tree.root();
        assert!(tree.is_dirty(root));
        assert_eq!(tree.take_suspicious_names(root), vec![Box::<str>::from("deep")]);
    }

    #[test]
    fn subtree_marking_covers_descendants() {
        let mut tree = sample_tree();
        let marked = mark_subtrees_dirty(
            &mut tree,
            [
                PathBuf::from("/root/src/main.rs"),
                PathBuf::from("/root/src"),
            ],
        );

        assert_eq!(marked, 1);
        assert!(tree.is_dirty(id(&tree, "/root/src/lib.rs")));
        assert!(tree.is_dirty(id(&tree, "/root/src/main.rs")));
        assert!(!tree.is_dirty(id(&tree, "/root/a.txt")));
    }

    #[test]
    fn cover_keeps_shallowest_paths() {
        let paths = vec![
            PathBuf::from("/root/src/main.rs"),
            PathBuf::from("/root/src"),
            PathBuf::from("/root/src/lib.rs"),
            PathBuf::from("/root/a.txt"),
            PathBuf::from("/root/a.txt"),
        ];
        assert_eq!(
            subtree_cover(paths),
            vec![PathBuf::from("/root/a.txt"), PathBuf::from("/root/src")]
        );
    }

    #[test]
    fn cover_compares_whole_components() {
        let paths = vec![PathBuf::from("/root/src"), PathBuf::from("/root/src-old")];
        assert_eq!(subtree_cover(paths).len(), 2);
    }

    #[test]
    fn root_covers_everything() {
        let paths = vec![
            PathBuf::from("/root/src/main.rs"),
            PathBuf::from("/root"),
            PathBuf::from("/root/a.txt"),
        ];
        assert_eq!(subtree_cover(paths), vec![PathBuf::from("/root")]);
    }
}
