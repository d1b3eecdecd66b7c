//! Posting lists
//!
//! A posting list holds one [`Posting`] per document containing a term,
//! ordered by document id. Single-document lookups binary search that order.

use serde::{Deserialize, Serialize};

use super::types::{DocId, Posting};

/// Postings for one term in one field, sorted by document id
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a posting, keeping document order
    ///
    /// Appends in the common case where `posting.doc` is the highest id so
    /// far; otherwise inserts in place. A posting for a document already in
    /// the list replaces it.
    pub fn push(&mut self, posting: Posting) {
        match self.postings.last() {
            Some(last) if last.doc >= posting.doc => {
                match self.postings.binary_search_by_key(&posting.doc, |p| p.doc) {
                    Ok(idx) => self.postings[idx] = posting,
                    Err(idx) => self.postings.insert(idx, posting),
                }
            }
            _ => self.postings.push(posting),
        }
    }

    /// Posting for a document, if it contains the term
    pub fn get(&self, doc: DocId) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc, |p| p.doc)
            .ok()
            .map(|idx| &self.postings[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter()
    }

    pub fn docs(&self) -> impl Iterator<Item = DocId> + '_ {
        self.postings.iter().map(|p| p.doc)
    }

    pub fn as_slice(&self) -> &[Posting] {
        &self.postings
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Number of documents containing the term (tombstones included)
    pub fn doc_frequency(&self) -> u32 {
        self.postings.len() as u32
    }

    /// Drop postings for which `keep` returns false
    pub fn retain<F: FnMut(DocId) -> bool>(&mut self, mut keep: F) {
        self.postings.retain(|p| keep(p.doc));
    }

    /// Append another list whose documents all follow this one's
    pub fn append(&mut self, other: &PostingList) {
        for posting in &other.postings {
            self.push(posting.clone());
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.postings.iter().map(Posting::size_bytes).sum()
    }
}
