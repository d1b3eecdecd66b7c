//! Core types for the query system

use std::collections::HashMap;

use crate::segment::DocId;

/// Matching documents with their accumulated scores
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocScores {
    scores: HashMap<DocId, f32>,
}

impl DocScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scores: HashMap::with_capacity(capacity),
        }
    }

    /// Add `score` to a document's total
    pub fn add(&mut self, doc: DocId, score: f32) {
        *self.scores.entry(doc).or_insert(0.0) += score;
    }

    /// Keep the larger of the existing score and `score`
    pub fn insert_max(&mut self, doc: DocId, score: f32) {
        let entry = self.scores.entry(doc).or_insert(score);
        if score > *entry {
            *entry = score;
        }
    }

    /// Multiply every score by `factor`
    pub fn scale(&mut self, factor: f32) {
        if factor == 1.0 {
            return;
        }
        for score in self.scores.values_mut() {
            *score *= factor;
        }
    }

    /// Sum another result set into this one (logical OR)
    pub fn union_sum(&mut self, other: DocScores) {
        if self.scores.is_empty() {
            self.scores = other.scores;
            return;
        }
        for (doc, score) in other.scores {
            self.add(doc, score);
        }
    }

    pub fn get(&self, doc: DocId) -> Option<f32> {
        self.scores.get(&doc).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, f32)> + '_ {
        self.scores.iter().map(|(&doc, &score)| (doc, score))
    }
}

/// A ranked document
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredDoc {
    pub doc: DocId,
    pub score: f32,
}

/// Query execution statistics
#[derive(Clone, Debug, Default)]
pub struct QueryStats {
    /// Number of documents that matched the query
    pub docs_matched: u64,
    /// Evaluation time in microseconds
    pub execution_time_us: u64,
}

impl IntoIterator for DocScores {
    type Item = (DocId, f32);
    type IntoIter = std::collections::hash_map::IntoIter<DocId, f32>;

    fn into_iter(self) -> Self::IntoIter {
        self.scores.into_iter()
    }
}

impl FromIterator<(DocId, f32)> for DocScores {
    fn from_iter<I: IntoIterator<Item = (DocId, f32)>>(iter: I) -> Self {
        let mut scores = DocScores::new();
        for (doc, score) in iter {
            scores.add(doc, score);
        }
        scores
    }
}
