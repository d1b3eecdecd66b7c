//! Segment merge policy and merging
//!
//! Every flush adds a segment, so query cost grows with commit count. When a
//! commit leaves more than `max_segments` segments, or tombstones make up too
//! large a share of the indexed documents, all segments are rewritten into one
//! and tombstoned documents are physically dropped.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use roaring::RoaringBitmap;

use super::postings::PostingList;
use super::reader::SegmentReader;
use super::types::{DocId, SegmentId};
use crate::config::WriterConfig;
use crate::schema::Field;

/// Reason why segments should be merged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeReason {
    /// More segments than the configured maximum
    TooManySegments,
    /// Deleted documents exceed the configured ratio
    HighDeleteRatio,
}

/// Merge-everything policy
#[derive(Clone, Debug)]
pub struct MergePolicy {
    max_segments: usize,
    max_delete_ratio: f64,
}

impl MergePolicy {
    pub fn new(config: &WriterConfig) -> Self {
        Self {
            max_segments: config.max_segments.max(1),
            max_delete_ratio: config.max_delete_ratio,
        }
    }

    /// Decide whether the segment set should be merged
    pub fn find_merge(&self, segments: &[Arc<SegmentReader>], tombstones: &RoaringBitmap) -> Option<MergeReason> {
        if segments.len() > self.max_segments {
            return Some(MergeReason::TooManySegments);
        }

        let total: u64 = segments.iter().map(|s| s.doc_count() as u64).sum();
        if total == 0 || tombstones.is_empty() {
            return None;
        }
        let ratio = tombstones.len() as f64 / total as f64;
        (ratio > self.max_delete_ratio).then_some(MergeReason::HighDeleteRatio)
    }
}

/// Rewrite `segments` into a single segment without tombstoned documents
///
/// Segments must be given in document-id order.
pub fn merge_segments(
    id: SegmentId,
    segments: &[Arc<SegmentReader>],
    tombstones: &RoaringBitmap,
) -> io::Result<SegmentReader> {
    let live = |doc: DocId| !tombstones.contains(doc.as_u32());

    let mut docs = Vec::new();
    let mut stored = Vec::new();
    let mut lengths: [Vec<u32>; Field::COUNT] = std::array::from_fn(|_| Vec::new());
    let mut terms: [BTreeMap<String, PostingList>; Field::COUNT] = std::array::from_fn(|_| BTreeMap::new());

    for segment in segments {
        for (doc, document, doc_lengths) in segment.iter_documents() {
            if !live(doc) {
                continue;
            }
            docs.push(doc);
            stored.push(document.clone());
            for (ord, len) in doc_lengths.into_iter().enumerate() {
                lengths[ord].push(len);
            }
        }

        for field in Field::ALL {
            let index = segment.field(field);
            for (term, ordinal) in index.terms().iter_terms() {
                let Some(list) = index.postings_at(ordinal) else {
                    continue;
                };
                let mut list = list.clone();
                list.retain(live);
                if list.is_empty() {
                    continue;
                }
                terms[field.ordinal()].entry(term).or_default().append(&list);
            }
        }
    }

    SegmentReader::build(id, docs, stored, lengths, terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValues, StoredDocument};
    use crate::segment::buffer::MutableBuffer;
    use crate::tokenizer::Tokenizer;

    fn segment(id: u64, docs: &[(u32, &str)]) -> Arc<SegmentReader> {
        let tokenizer = Tokenizer::default();
        let mut buffer = MutableBuffer::new();
        for (doc, name) in docs {
            buffer.index_document(
                DocId(*doc),
                StoredDocument {
                    key: None,
                    fields: FieldValues::new(*name, "Mains"),
                },
                &tokenizer,
            );
        }
        Arc::new(buffer.flush(SegmentId(id)).unwrap().unwrap())
    }

    #[test]
    fn test_policy_segment_count() {
        let config = WriterConfig {
            max_segments: 2,
            ..Default::default()
        };
        let policy = MergePolicy::new(&config);
        let segs = vec![segment(1, &[(0, "a")]), segment(2, &[(1, "b")])];
        assert_eq!(policy.find_merge(&segs, &RoaringBitmap::new()), None);

        let mut more = segs.clone();
        more.push(segment(3, &[(2, "c")]));
        assert_eq!(
            policy.find_merge(&more, &RoaringBitmap::new()),
            Some(MergeReason::TooManySegments)
        );
    }

    #[test]
    fn test_policy_delete_ratio() {
        let config = WriterConfig {
            max_delete_ratio: 0.5,
            ..Default::default()
        };
        let policy = MergePolicy::new(&config);
        let segs = vec![segment(1, &[(0, "a"), (1, "b"), (2, "c")])];

        let mut tombstones = RoaringBitmap::new();
        tombstones.insert(0);
        assert_eq!(policy.find_merge(&segs, &tombstones), None);
        tombstones.insert(1);
        assert_eq!(policy.find_merge(&segs, &tombstones), Some(MergeReason::HighDeleteRatio));
    }

    #[test]
    fn test_merge_drops_tombstones() {
        let segs = vec![
            segment(1, &[(0, "Pizza"), (1, "Spicy Pizza")]),
            segment(2, &[(2, "Pizza Margherita"), (3, "Pad Thai")]),
        ];
        let mut tombstones = RoaringBitmap::new();
        tombstones.insert(1);
        tombstones.insert(3);

        let merged = merge_segments(SegmentId(3), &segs, &tombstones).unwrap();
        assert_eq!(merged.docs(), &[DocId(0), DocId(2)]);

        let pizza: Vec<DocId> = merged.postings(Field::Name, "pizza").unwrap().docs().collect();
        assert_eq!(pizza, vec![DocId(0), DocId(2)]);
        assert!(merged.postings(Field::Name, "spicy").is_none());
        assert!(merged.postings(Field::Name, "thai").is_none());
        assert_eq!(merged.field_length(Field::Name, DocId(2)), Some(2));
        assert_eq!(merged.document(DocId(2)).unwrap().fields.name, "Pizza Margherita");
    }
}
