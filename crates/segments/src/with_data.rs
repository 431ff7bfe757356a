//! Segment table carrying one payload per segment.
//!
//! Used where every range needs a small tag next to its offsets, such as the
//! token type of a lexer segment or the separator length of a line.

use crate::array::SegmentArray;
use crate::error::{Result, SegmentError};

/// A `SegmentArray` whose segments each carry a `Copy` payload.
///
/// Payloads move together with their segments on every structural edit.
#[derive(Debug, Clone)]
pub struct SegmentArrayWithData<T: Copy + Default> {
    segments: SegmentArray,
    /// Payloads; kept as long as the segment table's physical capacity.
    data: Vec<T>,
}

impl<T: Copy + Default> Default for SegmentArrayWithData<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default> SegmentArrayWithData<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        let segments = SegmentArray::new();
        let data = vec![T::default(); segments.capacity()];
        Self { segments, data }
    }

    /// Returns the underlying offset table.
    #[inline]
    pub fn segments(&self) -> &SegmentArray {
        &self.segments
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.segment_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn sync_capacity(&mut self) {
        let capacity = self.segments.capacity();
        if self.data.len() < capacity {
            self.data.resize(capacity, T::default());
        }
    }

    /// Writes the segment and its payload at `index`.
    pub fn set_element_at(&mut self, index: usize, start: usize, end: usize, data: T) -> Result<()> {
        self.segments.set_element_at(index, start, end)?;
        self.sync_capacity();
        self.data[index] = data;
        Ok(())
    }

    pub(crate) fn push_segment(&mut self, start: usize, end: usize, data: T) {
        let index = self.segments.segment_count();
        self.segments.push_segment(start, end);
        self.sync_capacity();
        self.data[index] = data;
    }

    /// Returns the payload of the segment at `index`.
    pub fn segment_data(&self, index: usize) -> Result<T> {
        self.check_index(index)?;
        Ok(self.data[index])
    }

    /// Replaces the payload of the segment at `index`.
    pub fn set_segment_data(&mut self, index: usize, data: T) -> Result<()> {
        self.check_index(index)?;
        self.data[index] = data;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let count = self.segment_count();
        if index >= count {
            return Err(SegmentError::IndexOutOfBounds { index, count });
        }
        Ok(())
    }

    #[inline]
    pub fn segment_start(&self, index: usize) -> Result<usize> {
        self.segments.segment_start(index)
    }

    #[inline]
    pub fn segment_end(&self, index: usize) -> Result<usize> {
        self.segments.segment_end(index)
    }

    #[inline]
    pub fn last_valid_offset(&self) -> usize {
        self.segments.last_valid_offset()
    }

    #[inline]
    pub fn find_segment_index(&self, offset: usize) -> Result<usize> {
        self.segments.find_segment_index(offset)
    }

    pub fn change_segment_length(&mut self, start_index: usize, change: isize) {
        self.segments.change_segment_length(start_index, change);
    }

    pub fn shift_segments(&mut self, start_index: usize, shift: isize) {
        self.segments.shift_segments(start_index, shift);
    }

    pub fn remove_all(&mut self) {
        self.segments.remove_all();
    }

    /// Removes the index range `[start_index, end_index)` with its payloads.
    pub fn remove(&mut self, start_index: usize, end_index: usize) -> Result<()> {
        let count = self.segment_count();
        self.segments.remove(start_index, end_index)?;
        if end_index < count {
            self.data.copy_within(end_index..count, start_index);
        }
        Ok(())
    }

    /// Splices all segments and payloads of `other` in at `start_index`.
    pub fn insert(&mut self, other: &SegmentArrayWithData<T>, start_index: usize) -> Result<()> {
        let count = self.segment_count();
        let inserted = other.segment_count();
        self.segments.insert(&other.segments, start_index)?;
        if inserted == 0 {
            return Ok(());
        }
        self.sync_capacity();
        if start_index < count {
            self.data
                .copy_within(start_index..count, start_index + inserted);
        }
        self.data[start_index..start_index + inserted].copy_from_slice(&other.data[..inserted]);
        Ok(())
    }

    /// Overwrites `len` segments and payloads starting at `start_index`.
    pub fn replace(&mut self, start_index: usize, other: &SegmentArrayWithData<T>, len: usize) -> Result<()> {
        self.segments.replace(start_index, &other.segments, len)?;
        self.data[start_index..start_index + len].copy_from_slice(&other.data[..len]);
        Ok(())
    }

    /// Returns an iterator over `(start, end, data)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.segments
            .iter()
            .zip(self.data.iter().copied())
            .map(|((start, end), data)| (start, end, data))
    }
}

impl<T: Copy + Default + PartialEq> PartialEq for SegmentArrayWithData<T> {
    fn eq(&self, other: &Self) -> bool {
        self.segment_count() == other.segment_count() && self.iter().eq(other.iter())
    }
}

impl<T: Copy + Default + Eq> Eq for SegmentArrayWithData<T> {}
