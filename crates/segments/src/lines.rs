//! Line table for document text.
//!
//! Each line is one segment whose end includes its separator (`\n`, `\r\n`
//! or `\r`). Text that is empty or ends with a separator has a trailing empty
//! line, so a document always has at least one line and its length is the
//! table's last valid offset.

use crate::error::{Result, SegmentError};
use crate::with_data::SegmentArrayWithData;

/// Splits `text` into `(start, end, separator_len)` lines offset by `base`.
///
/// A trailing empty line is emitted only when `keep_trailing_empty` is set.
fn parse_lines(text: &[u8], base: usize, keep_trailing_empty: bool) -> Vec<(usize, usize, u8)> {
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut i = 0;
    while i < text.len() {
        let separator_len = match text[i] {
            b'\n' => 1,
            b'\r' if text.get(i + 1) == Some(&b'\n') => 2,
            b'\r' => 1,
            _ => {
                i += 1;
                continue;
            }
        };
        i += separator_len;
        lines.push((base + line_start, base + i, separator_len as u8));
        line_start = i;
    }
    if line_start < text.len() || keep_trailing_empty {
        lines.push((base + line_start, base + text.len(), 0));
    }
    lines
}

/// Line start/end offsets of a document, with separator lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSegments {
    lines: SegmentArrayWithData<u8>,
}

impl Default for LineSegments {
    fn default() -> Self {
        Self::from_text("")
    }
}

impl LineSegments {
    /// Builds the line table for `text`.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: Self::build(parse_lines(text.as_bytes(), 0, true)),
        }
    }

    fn build(parsed: Vec<(usize, usize, u8)>) -> SegmentArrayWithData<u8> {
        let mut lines = SegmentArrayWithData::new();
        for (start, end, separator_len) in parsed {
            lines.push_segment(start, end, separator_len);
        }
        lines
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.lines.segment_count()
    }

    /// Returns the length of the text the table describes.
    #[inline]
    pub fn text_len(&self) -> usize {
        self.lines.last_valid_offset()
    }

    #[inline]
    pub fn line_start(&self, line: usize) -> Result<usize> {
        self.lines.segment_start(line)
    }

    /// Returns the end offset of `line`, separator included.
    #[inline]
    pub fn line_end(&self, line: usize) -> Result<usize> {
        self.lines.segment_end(line)
    }

    /// Returns the end offset of `line`, separator excluded.
    pub fn line_end_without_separator(&self, line: usize) -> Result<usize> {
        let end = self.lines.segment_end(line)?;
        Ok(end - usize::from(self.lines.segment_data(line)?))
    }

    /// Returns the separator length of `line` (`0` for the last line).
    #[inline]
    pub fn separator_len(&self, line: usize) -> Result<usize> {
        self.lines.segment_data(line).map(usize::from)
    }

    /// Returns the line containing `offset`.
    #[inline]
    pub fn line_number(&self, offset: usize) -> Result<usize> {
        self.lines.find_segment_index(offset)
    }

    /// Updates the table after `removed_len` bytes at `offset` were replaced
    /// by `inserted_len` bytes, producing `new_text`.
    ///
    /// Only the lines touched by the edit (and the line before them, whose
    /// separator may merge with the edit) are re-parsed; later lines are
    /// shifted in place.
    pub fn apply_edit(
        &mut self,
        new_text: &str,
        offset: usize,
        removed_len: usize,
        inserted_len: usize,
    ) -> Result<()> {
        let old_len = self.text_len();
        let edit_end = offset.saturating_add(removed_len);
        if edit_end > old_len {
            return Err(SegmentError::OffsetOutOfBounds {
                offset: edit_end,
                last_valid: old_len,
            });
        }
        let expected = old_len - removed_len + inserted_len;
        if new_text.len() != expected {
            return Err(SegmentError::LengthMismatch {
                expected,
                actual: new_text.len(),
            });
        }

        let first_line = self.line_number(offset)?.saturating_sub(1);
        let last_line = self.line_number(edit_end)?;
        let region_start = self.line_start(first_line)?;
        let new_region_end = self.line_end(last_line)? - removed_len + inserted_len;
        let reaches_end = last_line + 1 == self.line_count();

        let parsed = parse_lines(
            &new_text.as_bytes()[region_start..new_region_end],
            region_start,
            reaches_end,
        );
        let delta = inserted_len as isize - removed_len as isize;

        self.lines.remove(first_line, last_line + 1)?;
        self.lines.shift_segments(first_line, delta);
        self.lines.insert(&Self::build(parsed), first_line)?;
        Ok(())
    }
}
