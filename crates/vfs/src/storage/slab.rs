//! Slot arena for cached entries.
//!
//! Entries live in a `Vec` of slots; removed slots are threaded into a
//! freelist and reused by later inserts, so ids stay stable for the lifetime
//! of the entry they name.

use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};

use super::index_types::EntryId;

enum Slot<T> {
    /// Free; holds the next free index.
    Vacant(usize),
    Occupied(T),
}

/// Initial number of slots to allocate.
const INITIAL_SLOTS: usize = 64;

pub struct Slab<T> {
    /// Slot storage; `entries.len()` is the number of initialized slots.
    entries: Vec<Slot<T>>,
    /// Logical element count (occupied slots only).
    len: usize,
    /// Head of the freelist (index of the next available slot).
    next: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(INITIAL_SLOTS),
            len: 0,
            next: 0,
        }
    }

    /// Inserts a value, returning its stable id.
    pub fn insert(&mut self, value: T) -> EntryId {
        let key = self.next;
        if key == self.entries.len() {
            // Appending to end
            self.entries.push(Slot::Occupied(value));
            self.next = self.entries.len();
        } else {
            // Reusing a vacant slot from the freelist
            let next_free = match self.entries[key] {
                Slot::Vacant(next) => next,
                Slot::Occupied(_) => unreachable!("freelist head points at an occupied slot"),
            };
            self.entries[key] = Slot::Occupied(value);
            self.next = next_free;
        }
        self.len += 1;
        EntryId::new(key)
    }

    pub fn get(&self, id: EntryId) -> Option<&T> {
        match self.entries.get(id.get())? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant(_) => None,
        }
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut T> {
        match self.entries.get_mut(id.get())? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant(_) => None,
        }
    }

    /// Removes the value at `id` if it exists, returning it.
    pub fn try_remove(&mut self, id: EntryId) -> Option<T> {
        let index = id.get();
        let entry = self.entries.get_mut(index)?;
        if matches!(entry, Slot::Vacant(_)) {
            return None;
        }
        match mem::replace(entry, Slot::Vacant(self.next)) {
            Slot::Occupied(value) => {
                self.len -= 1;
                self.next = index;
                Some(value)
            }
            Slot::Vacant(_) => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Index<EntryId> for Slab<T> {
    type Output = T;

    fn index(&self, id: EntryId) -> &Self::Output {
        self.get(id).expect("invalid entry id")
    }
}

impl<T> IndexMut<EntryId> for Slab<T> {
    fn index_mut(&mut self, id: EntryId) -> &mut Self::Output {
        self.get_mut(id).expect("invalid entry id")
    }
}

impl<T> fmt::Debug for Slab<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("len", &self.len)
            .field("next", &self.next)
            .field("slots", &self.entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
