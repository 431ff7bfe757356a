//! Storage layer for the cached snapshot tree.
//!
//! This module provides the in-memory mirror of the filesystem:
//! - Slot arena with a freelist (`Slab<T>`)
//! - Compact entry ids (`EntryId`, `OptionEntryId`)
//! - Entry types (`CachedEntry`, `EntryKind`, `DirectoryChildren`)
//! - The rooted tree itself (`CachedTree`)

mod index_types;
mod node;
mod slab;
mod tree;

// Re-export storage types
pub use index_types::{EntryId, OptionEntryId};
pub use node::{CachedEntry, DirectoryChildren, EntryFlags, EntryKind};
pub use slab::Slab;
pub use tree::CachedTree;
