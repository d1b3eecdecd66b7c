//! Immutable segment reader
//!
//! A segment is the unit produced by a buffer flush or a merge. It holds,
//! per field, an FST term dictionary with posting lists plus per-document
//! field lengths, and the stored documents. Nothing in it changes after
//! construction; deletions are tracked outside it as tombstones.

use std::collections::BTreeMap;
use std::io;

use super::postings::PostingList;
use super::statistics::FieldStatistics;
use super::term_dict::{TermDictionary, TermDictionaryBuilder};
use super::types::{DocId, SegmentId};
use crate::models::StoredDocument;
use crate::schema::Field;

/// Metadata for a segment
#[derive(Clone, Debug)]
pub struct SegmentMeta {
    pub id: SegmentId,
    /// Number of documents in the segment (tombstones included)
    pub doc_count: u32,
    pub min_doc: DocId,
    pub max_doc: DocId,
    /// Approximate size in bytes
    pub size_bytes: usize,
}

/// Inverted index of a single field within a segment
#[derive(Debug)]
pub struct FieldIndex {
    terms: TermDictionary,
    postings: Vec<PostingList>,
    /// Field length per document, parallel to the segment's doc list
    lengths: Vec<u32>,
    stats: FieldStatistics,
}

impl FieldIndex {
    fn build(terms: BTreeMap<String, PostingList>, lengths: Vec<u32>) -> io::Result<Self> {
        let mut builder = TermDictionaryBuilder::with_capacity(terms.len());
        for (term, list) in terms {
            if !list.is_empty() {
                builder.add(term, list);
            }
        }
        let (terms, postings) = builder.build()?;

        let mut stats = FieldStatistics::default();
        for &len in &lengths {
            stats.add(len);
        }

        Ok(Self {
            terms,
            postings,
            lengths,
            stats,
        })
    }

    pub fn terms(&self) -> &TermDictionary {
        &self.terms
    }

    /// Posting list for an exact term
    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term).map(|ord| &self.postings[ord])
    }

    /// Posting list by dictionary ordinal
    pub fn postings_at(&self, ordinal: usize) -> Option<&PostingList> {
        self.postings.get(ordinal)
    }

    pub fn stats(&self) -> &FieldStatistics {
        &self.stats
    }
}

/// Immutable segment
#[derive(Debug)]
pub struct SegmentReader {
    meta: SegmentMeta,
    /// Document ids in increasing order
    docs: Vec<DocId>,
    /// Stored documents, parallel to `docs`
    stored: Vec<StoredDocument>,
    fields: [FieldIndex; Field::COUNT],
}

impl SegmentReader {
    /// Build a segment from per-document data and per-field term maps
    ///
    /// `docs` must be sorted by id; `stored` and every `lengths` vector are
    /// parallel to it.
    pub fn build(
        id: SegmentId,
        docs: Vec<DocId>,
        stored: Vec<StoredDocument>,
        lengths: [Vec<u32>; Field::COUNT],
        terms: [BTreeMap<String, PostingList>; Field::COUNT],
    ) -> io::Result<Self> {
        debug_assert!(docs.windows(2).all(|w| w[0] < w[1]));
        debug_assert_eq!(docs.len(), stored.len());

        let mut size_bytes = 0usize;
        for field_terms in &terms {
            for (term, list) in field_terms {
                size_bytes += term.len() + list.size_bytes();
            }
        }
        size_bytes += stored
            .iter()
            .map(|d| d.fields.name.len() + d.fields.category.len() + d.key.as_ref().map_or(0, String::len))
            .sum::<usize>();

        let mut fields = Vec::with_capacity(Field::COUNT);
        for (field_terms, field_lengths) in terms.into_iter().zip(lengths) {
            fields.push(FieldIndex::build(field_terms, field_lengths)?);
        }
        let fields: [FieldIndex; Field::COUNT] = fields
            .try_into()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "field count mismatch"))?;

        let meta = SegmentMeta {
            id,
            doc_count: docs.len() as u32,
            min_doc: docs.first().copied().unwrap_or_default(),
            max_doc: docs.last().copied().unwrap_or_default(),
            size_bytes,
        };

        Ok(Self {
            meta,
            docs,
            stored,
            fields,
        })
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn id(&self) -> SegmentId {
        self.meta.id
    }

    pub fn doc_count(&self) -> u32 {
        self.meta.doc_count
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Document ids held by this segment, in order
    pub fn docs(&self) -> &[DocId] {
        &self.docs
    }

    fn local(&self, doc: DocId) -> Option<usize> {
        if doc < self.meta.min_doc || doc > self.meta.max_doc {
            return None;
        }
        self.docs.binary_search(&doc).ok()
    }

    pub fn contains(&self, doc: DocId) -> bool {
        self.local(doc).is_some()
    }

    pub fn field(&self, field: Field) -> &FieldIndex {
        &self.fields[field.ordinal()]
    }

    pub fn postings(&self, field: Field, term: &str) -> Option<&PostingList> {
        self.field(field).postings(term)
    }

    /// Stored fields of a document
    pub fn document(&self, doc: DocId) -> Option<&StoredDocument> {
        self.local(doc).map(|i| &self.stored[i])
    }

    /// Length in tokens of a document's field
    pub fn field_length(&self, field: Field, doc: DocId) -> Option<u32> {
        self.local(doc)
            .and_then(|i| self.field(field).lengths.get(i).copied())
    }

    /// Iterate `(doc, stored, lengths)` for every document in order
    pub fn iter_documents(&self) -> impl Iterator<Item = (DocId, &StoredDocument, [u32; Field::COUNT])> + '_ {
        self.docs.iter().enumerate().map(move |(i, &doc)| {
            let lengths = std::array::from_fn(|f| self.fields[f].lengths[i]);
            (doc, &self.stored[i], lengths)
        })
    }
}
