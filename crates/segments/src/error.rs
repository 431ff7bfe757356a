/// Errors reported by segment tables.
///
/// Every variant describes a bug in the calling layer (a bad index, an offset
/// outside the table, or a broken contiguity invariant), never an expected
/// runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    #[error("invalid segment at index {index}: start {start} is past end {end}")]
    InvalidSegment {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("no segments available, offset = {offset}")]
    Empty { offset: usize },

    #[error("wrong offset: {offset}, should be in range [0, {last_valid}]")]
    OffsetOutOfBounds { offset: usize, last_valid: usize },

    #[error("wrong segment index: {index}, available segments: {count}")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("invalid index range [{start}, {end}) for {count} segments")]
    InvalidRange {
        start: usize,
        end: usize,
        count: usize,
    },

    #[error("no segment covers offset {offset}")]
    Gap { offset: usize },

    #[error("text length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, SegmentError>;
