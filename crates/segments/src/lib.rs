//! Offset-mapping tables for document text.
//!
//! This crate provides the low-level interval tables that line numbering,
//! token boundaries and fold regions are built on:
//! - `SegmentArray`: dense index to half-open `[start, end)` range mapping
//! - `SegmentArrayWithData`: the same table with one payload per segment
//! - `LineSegments`: a line table for document text with incremental updates

pub mod array;
pub mod error;
pub mod lines;
pub mod with_data;

// Re-export main types
pub use array::SegmentArray;
pub use error::{Result, SegmentError};
pub use lines::LineSegments;
pub use with_data::SegmentArrayWithData;
