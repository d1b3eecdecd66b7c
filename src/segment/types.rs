//! Core types for the segment-based index

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment identifier (monotonically increasing per index)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl SegmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment_{}", self.0)
    }
}

/// Internal document id
///
/// Assigned from a single sequence by the writer, never reused. Ids are
/// global across segments: a segment covers a contiguous, increasing range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub u32);

impl DocId {
    pub const MAX: DocId = DocId(u32::MAX);

    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single posting entry within a posting list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: DocId,
    /// Term frequency in this document's field
    pub term_frequency: u32,
    /// Token positions (for phrase queries, if the field indexes them)
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(doc: DocId, term_frequency: u32) -> Self {
        Self {
            doc,
            term_frequency,
            positions: Vec::new(),
        }
    }

    pub fn with_positions(doc: DocId, term_frequency: u32, positions: Vec<u32>) -> Self {
        Self {
            doc,
            term_frequency,
            positions,
        }
    }

    /// Approximate heap footprint, used for buffer accounting
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Posting>() + self.positions.len() * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_id_display() {
        let id = SegmentId::new(7);
        assert_eq!(id.to_string(), "segment_7");
        assert_eq!(id.next(), SegmentId(8));
    }

    #[test]
    fn test_doc_id_ordering() {
        assert!(DocId::new(1) < DocId::new(2));
        assert_eq!(DocId::new(41).next(), DocId(42));
        assert_eq!(DocId::new(3).as_usize(), 3);
        assert_eq!(serde_json::to_string(&DocId(5)).unwrap(), "5");
    }
}
