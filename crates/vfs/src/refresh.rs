//! Incremental refresh of the cached tree.
//!
//! - `RefreshWorker` diffs dirty entries against the live filesystem
//! - `ChangeEvent` describes each difference; `apply_events` folds them back
//!   into the tree
//! - Dirty marking turns watcher paths into dirty entries

mod dirty;
mod events;
mod session;
mod worker;

pub use dirty::{mark_paths_dirty, mark_subtrees_dirty};
pub use events::{apply_events, ChangeEvent, EntryProperty};
pub use session::RefreshSessionId;
pub use worker::RefreshWorker;
