//! Mutable buffer for in-memory writes
//!
//! Accumulates analyzed documents until an implicit or explicit flush turns
//! them into an immutable [`SegmentReader`]. Document ids arrive in
//! increasing order, so every posting list stays sorted by construction.

use std::collections::BTreeMap;
use std::io;

use super::postings::PostingList;
use super::reader::SegmentReader;
use super::types::{DocId, Posting, SegmentId};
use crate::config::WriterConfig;
use crate::models::StoredDocument;
use crate::schema::{Field, SCHEMA};
use crate::tokenizer::Tokenizer;

/// In-memory mutable buffer for recent writes
#[derive(Debug)]
pub struct MutableBuffer {
    /// Per-field term to postings mapping, term-ordered
    terms: [BTreeMap<String, PostingList>; Field::COUNT],
    /// Per-field token counts, parallel to `docs`
    lengths: [Vec<u32>; Field::COUNT],
    docs: Vec<DocId>,
    stored: Vec<StoredDocument>,
    /// Approximate size in bytes
    size_bytes: usize,
}

impl Default for MutableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableBuffer {
    /// Create a new empty mutable buffer
    pub fn new() -> Self {
        Self {
            terms: std::array::from_fn(|_| BTreeMap::new()),
            lengths: std::array::from_fn(|_| Vec::new()),
            docs: Vec::new(),
            stored: Vec::new(),
            size_bytes: 0,
        }
    }

    /// Index a document into the buffer
    ///
    /// Every schema field is tokenized; fields indexed with positions keep
    /// them for phrase matching.
    pub fn index_document(&mut self, doc: DocId, stored: StoredDocument, tokenizer: &Tokenizer) {
        debug_assert!(self.docs.last().map_or(true, |&last| last < doc));

        for mapping in SCHEMA.iter() {
            let ord = mapping.field.ordinal();
            if !mapping.index.is_indexed() {
                self.lengths[ord].push(0);
                continue;
            }

            let text = stored.fields.get(mapping.field);
            let positions = tokenizer.tokenize_with_positions(text);
            let length: u32 = positions.values().map(|p| p.len() as u32).sum();
            self.lengths[ord].push(length);

            for (term, positions) in positions {
                let tf = positions.len() as u32;
                let posting = if mapping.index.has_positions() {
                    Posting::with_positions(doc, tf, positions)
                } else {
                    Posting::new(doc, tf)
                };
                self.size_bytes += term.len() + posting.size_bytes();
                self.terms[ord].entry(term).or_default().push(posting);
            }
        }

        self.size_bytes += std::mem::size_of::<StoredDocument>()
            + stored.fields.name.len()
            + stored.fields.category.len()
            + stored.key.as_ref().map_or(0, String::len);
        self.docs.push(doc);
        self.stored.push(stored);
    }

    /// Number of buffered documents
    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Approximate buffer size in bytes
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Check if the buffer has reached a flush threshold
    pub fn should_flush(&self, config: &WriterConfig) -> bool {
        self.docs.len() >= config.max_buffered_docs || self.size_bytes >= config.max_buffer_bytes
    }

    /// Whether the buffer holds this document
    pub fn contains(&self, doc: DocId) -> bool {
        self.docs.binary_search(&doc).is_ok()
    }

    /// Discard all buffered documents
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Turn the buffered documents into a segment, leaving the buffer empty
    ///
    /// Returns `None` when there is nothing to flush.
    pub fn flush(&mut self, id: SegmentId) -> io::Result<Option<SegmentReader>> {
        if self.is_empty() {
            return Ok(None);
        }
        let buffer = std::mem::take(self);
        let segment = SegmentReader::build(id, buffer.docs, buffer.stored, buffer.lengths, buffer.terms)?;
        Ok(Some(segment))
    }
}
