//! Ids of cached entries.

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

const NONE_SENTINEL: u32 = u32::MAX;

/// Slot of a `CachedEntry` in the tree's arena.
///
/// Stays valid until the entry is removed; the slot may then be handed to a
/// later entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntryId(u32);

impl EntryId {
    /// Never names a live entry. Used for a tree whose root was removed.
    pub const INVALID: Self = Self(NONE_SENTINEL);

    /// # Panics
    /// If `slot` does not fit below the sentinel.
    #[inline]
    pub fn new(slot: usize) -> Self {
        assert!(
            slot < NONE_SENTINEL as usize,
            "entry slot {slot} does not fit in an EntryId"
        );
        Self(slot as u32)
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.0 as usize
    }
}

impl Serialize for EntryId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u32::deserialize(deserializer)? {
            NONE_SENTINEL => Err(D::Error::custom("entry id is the reserved sentinel")),
            slot => Ok(Self(slot)),
        }
    }
}

/// Parent link of an entry: an `EntryId`, or none for the root.
///
/// Kept at the width of a bare id by reusing the sentinel for "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct OptionEntryId(u32);

impl OptionEntryId {
    #[inline]
    pub fn none() -> Self {
        Self(NONE_SENTINEL)
    }

    #[inline]
    pub fn some(id: EntryId) -> Self {
        Self(id.0)
    }

    #[inline]
    pub fn from_option(id: Option<EntryId>) -> Self {
        id.map_or(Self::none(), Self::some)
    }

    #[inline]
    pub fn to_option(self) -> Option<EntryId> {
        (self.0 != NONE_SENTINEL).then_some(EntryId(self.0))
    }
}

impl Default for OptionEntryId {
    fn default() -> Self {
        Self::none()
    }
}
