//! Segment-based inverted index for full-text search
//!
//! # Architecture
//!
//! - `MutableBuffer`: In-memory buffer for recent writes
//! - `SegmentReader`: Immutable segment with per-field FST term dictionaries,
//!   posting lists, field lengths and stored documents
//! - `MergePolicy`: Decides when segments are rewritten into one

mod types;
mod statistics;
mod buffer;
mod postings;
mod term_dict;
mod reader;
mod merge;

pub use types::*;
pub use statistics::*;
pub use buffer::*;
pub use postings::*;
pub use term_dict::*;
pub use reader::*;
pub use merge::*;
