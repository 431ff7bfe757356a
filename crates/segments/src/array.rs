//! Growable table of half-open integer segments.
//!
//! A `SegmentArray` maps a dense index space `[0, count)` to ranges
//! `[start, end)` kept in two parallel arrays. The arrays are over-allocated
//! so repeated appends cost amortized O(1), and offset lookup is a binary
//! search over the ranges.
//!
//! Callers are responsible for keeping segments ordered and contiguous; the
//! table only preserves whatever order the mutating operations are given.

use std::fmt;

use crate::error::{Result, SegmentError};

/// Physical capacity of a freshly created table.
pub const INITIAL_CAPACITY: usize = 64;

/// Capacity used for the first allocation of an empty backing array.
const MIN_BLOCK_SIZE: usize = 16;

/// Computes the physical capacity needed to write at `index`.
///
/// Grows by 20% (plus one) per step, starting from the current capacity or
/// `MIN_BLOCK_SIZE` for an empty array.
#[inline]
pub(crate) fn calc_capacity(current: usize, index: usize) -> usize {
    let mut capacity = if current == 0 { MIN_BLOCK_SIZE } else { current };
    while capacity <= index {
        capacity = capacity * 120 / 100 + 1;
    }
    capacity
}

/// Applies a signed delta to an offset, reporting results that leave `usize`.
#[inline]
pub(crate) fn shift_offset(value: usize, delta: isize) -> Option<usize> {
    value.checked_add_signed(delta)
}

/// Dense index to `[start, end)` segment table.
#[derive(Clone)]
pub struct SegmentArray {
    /// Segment start offsets; `starts.len()` is the physical capacity.
    starts: Vec<usize>,
    /// Segment end offsets (exclusive); same length as `starts`.
    ends: Vec<usize>,
    /// Logical segment count.
    count: usize,
}

impl Default for SegmentArray {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentArray {
    /// Creates an empty table with the default physical capacity.
    pub fn new() -> Self {
        Self {
            starts: vec![0; INITIAL_CAPACITY],
            ends: vec![0; INITIAL_CAPACITY],
            count: 0,
        }
    }

    /// Returns the number of segments.
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.count
    }

    /// Returns true if the table holds no segments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the physical capacity of the backing arrays.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.starts.len()
    }

    /// Grows the backing arrays so that `index` is writable.
    fn reallocate(&mut self, index: usize) {
        if index < self.starts.len() {
            return;
        }
        let capacity = calc_capacity(self.starts.len(), index);
        self.starts.resize(capacity, 0);
        self.ends.resize(capacity, 0);
    }

    /// Writes (or overwrites) the segment at `index`.
    ///
    /// Writing past the current count extends the table to `index + 1`
    /// segments; skipped slots read as empty `[0, 0)` segments.
    pub fn set_element_at(&mut self, index: usize, start: usize, end: usize) -> Result<()> {
        if start > end {
            log::error!("invalid segment at {index}: start {start} > end {end}");
            return Err(SegmentError::InvalidSegment { index, start, end });
        }
        self.write(index, start, end);
        Ok(())
    }

    /// Appends a segment produced by a trusted builder.
    pub(crate) fn push_segment(&mut self, start: usize, end: usize) {
        debug_assert!(start <= end, "segment start {start} past end {end}");
        self.write(self.count, start, end);
    }

    fn write(&mut self, index: usize, start: usize, end: usize) {
        self.reallocate(index);
        self.starts[index] = start;
        self.ends[index] = end;
        if index >= self.count {
            self.count = index + 1;
        }
    }

    /// Returns the offset one past the last segment, or `0` when empty.
    #[inline]
    pub fn last_valid_offset(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            self.ends[self.count - 1]
        }
    }

    /// Finds the index of the segment containing `offset`.
    ///
    /// `last_valid_offset()` maps to the last segment, and offset `0` maps to
    /// index `0` on an empty table.
    ///
    /// # Errors
    ///
    /// - `SegmentError::Empty` if the table is empty and `offset != 0`
    /// - `SegmentError::OffsetOutOfBounds` if `offset > last_valid_offset()`
    /// - `SegmentError::Gap` if no segment covers `offset`
    pub fn find_segment_index(&self, offset: usize) -> Result<usize> {
        if self.count == 0 {
            if offset == 0 {
                return Ok(0);
            }
            return Err(SegmentError::Empty { offset });
        }

        let last_valid = self.last_valid_offset();
        if offset > last_valid {
            return Err(SegmentError::OffsetOutOfBounds { offset, last_valid });
        }

        let last_index = self.count - 1;
        if offset == last_valid {
            return Ok(last_index);
        }

        let mut start = 0;
        let mut end = last_index;
        while start < end {
            let i = start + (end - start) / 2;
            if offset < self.starts[i] {
                end = i;
            } else if offset >= self.ends[i] {
                start = i + 1;
            } else {
                return Ok(i);
            }
        }

        if self.starts[start] <= offset && offset < self.ends[start] {
            Ok(start)
        } else {
            log::error!(
                "segment gap at offset {offset}: nearest segment {start} is [{}, {})",
                self.starts[start],
                self.ends[start]
            );
            Err(SegmentError::Gap { offset })
        }
    }

    /// Grows or shrinks the segment at `start_index` by `change` and shifts
    /// every later segment by the same amount.
    pub fn change_segment_length(&mut self, start_index: usize, change: isize) {
        if start_index < self.count {
            let end = self.ends[start_index];
            self.ends[start_index] = match shift_offset(end, change) {
                Some(end) => end,
                None => {
                    log::error!("error changing segment length: ends[{start_index}] = {end} + {change}");
                    end.saturating_add_signed(change)
                }
            };
        }
        self.shift_segments(start_index.saturating_add(1), change);
    }

    /// Adds `shift` to the start and end of every segment from `start_index` on.
    ///
    /// A coordinate that would leave the valid offset range is reported and
    /// clamped.
    pub fn shift_segments(&mut self, start_index: usize, shift: isize) {
        for i in start_index..self.count {
            let (start, end) = (self.starts[i], self.ends[i]);
            match (shift_offset(start, shift), shift_offset(end, shift)) {
                (Some(new_start), Some(new_end)) => {
                    self.starts[i] = new_start;
                    self.ends[i] = new_end;
                }
                _ => {
                    log::error!(
                        "error shifting segments: starts[{i}] = {start}, ends[{i}] = {end}, shift = {shift}"
                    );
                    self.starts[i] = start.saturating_add_signed(shift);
                    self.ends[i] = end.saturating_add_signed(shift);
                }
            }
        }
    }

    /// Drops every segment, keeping the backing storage.
    pub fn remove_all(&mut self) {
        self.count = 0;
    }

    /// Removes the index range `[start_index, end_index)`, moving later
    /// segments down.
    pub fn remove(&mut self, start_index: usize, end_index: usize) -> Result<()> {
        if start_index > end_index || end_index > self.count {
            return Err(SegmentError::InvalidRange {
                start: start_index,
                end: end_index,
                count: self.count,
            });
        }
        if end_index < self.count {
            self.starts.copy_within(end_index..self.count, start_index);
            self.ends.copy_within(end_index..self.count, start_index);
        }
        self.count -= end_index - start_index;
        Ok(())
    }

    /// Splices all segments of `other` in at `start_index`, moving later
    /// segments up.
    pub fn insert(&mut self, other: &SegmentArray, start_index: usize) -> Result<()> {
        if start_index > self.count {
            return Err(SegmentError::InvalidRange {
                start: start_index,
                end: start_index,
                count: self.count,
            });
        }
        let inserted = other.count;
        if inserted == 0 {
            return Ok(());
        }

        self.reallocate(self.count + inserted - 1);
        if start_index < self.count {
            self.starts
                .copy_within(start_index..self.count, start_index + inserted);
            self.ends
                .copy_within(start_index..self.count, start_index + inserted);
        }
        self.starts[start_index..start_index + inserted].copy_from_slice(&other.starts[..inserted]);
        self.ends[start_index..start_index + inserted].copy_from_slice(&other.ends[..inserted]);
        self.count += inserted;
        Ok(())
    }

    /// Overwrites `len` segments starting at `start_index` with the first
    /// `len` segments of `other`. The segment count does not change.
    pub fn replace(&mut self, start_index: usize, other: &SegmentArray, len: usize) -> Result<()> {
        if len > other.count || start_index.saturating_add(len) > self.count {
            return Err(SegmentError::InvalidRange {
                start: start_index,
                end: start_index.saturating_add(len),
                count: self.count,
            });
        }
        self.starts[start_index..start_index + len].copy_from_slice(&other.starts[..len]);
        self.ends[start_index..start_index + len].copy_from_slice(&other.ends[..len]);
        Ok(())
    }

    /// Returns the start offset of the segment at `index`.
    #[inline]
    pub fn segment_start(&self, index: usize) -> Result<usize> {
        self.check_index(index)?;
        Ok(self.starts[index])
    }

    /// Returns the (exclusive) end offset of the segment at `index`.
    #[inline]
    pub fn segment_end(&self, index: usize) -> Result<usize> {
        self.check_index(index)?;
        Ok(self.ends[index])
    }

    #[inline]
    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.count {
            return Err(SegmentError::IndexOutOfBounds {
                index,
                count: self.count,
            });
        }
        Ok(())
    }

    /// Returns an iterator over `(start, end)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.starts[..self.count]
            .iter()
            .copied()
            .zip(self.ends[..self.count].iter().copied())
    }
}

impl PartialEq for SegmentArray {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.iter().eq(other.iter())
    }
}

impl Eq for SegmentArray {}

impl fmt::Debug for SegmentArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentArray")
            .field("count", &self.count)
            .field("capacity", &self.capacity())
            .field(
                "segments",
                &self.iter().map(|(start, end)| start..end).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
