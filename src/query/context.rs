//! Query execution context
//!
//! The `QueryContext` binds a query evaluation to one snapshot and carries
//! the scoring parameters, a document-frequency cache and the deadline.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::types::DocScores;
use crate::error::DishdexError;
use crate::index::Snapshot;
use crate::schema::Field;
use crate::segment::Bm25Params;
use crate::Result;

/// Query execution context providing access to snapshot data
pub struct QueryContext<'a> {
    snapshot: &'a Snapshot,
    bm25: Bm25Params,
    /// Live document frequency per (field, term)
    df_cache: RwLock<HashMap<(Field, String), u32>>,
    started: Instant,
    deadline: Option<Instant>,
}

impl<'a> QueryContext<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            bm25: Bm25Params::default(),
            df_cache: RwLock::new(HashMap::new()),
            started: Instant::now(),
            deadline: None,
        }
    }

    pub fn with_bm25(mut self, bm25: Bm25Params) -> Self {
        self.bm25 = bm25;
        self
    }

    /// Abort evaluation with `SearchTimeout` once `timeout` has elapsed
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(self.started + timeout);
        self
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    /// Number of live documents
    pub fn total_docs(&self) -> u32 {
        self.snapshot.live_doc_count()
    }

    /// Fail if the deadline has passed
    pub fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DishdexError::SearchTimeout {
                elapsed_ms: self.started.elapsed().as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }

    /// Live document frequency of a term, cached for the query's lifetime
    pub fn doc_frequency(&self, field: Field, term: &str) -> u32 {
        let key = (field, term.to_string());
        if let Some(&df) = self.df_cache.read().get(&key) {
            return df;
        }
        let df = self.snapshot.doc_frequency(field, term);
        self.df_cache.write().insert(key, df);
        df
    }

    /// BM25+ scores of every live document containing `term`, times `weight`
    pub fn score_term(&self, field: Field, term: &str, weight: f32) -> DocScores {
        let df = self.doc_frequency(field, term);
        if df == 0 {
            return DocScores::new();
        }

        let total_docs = self.total_docs();
        let avgdl = self.snapshot.avgdl(field);
        let mut scores = DocScores::with_capacity(df as usize);
        for posting in self.snapshot.postings(field, term) {
            let doc_len = self.snapshot.field_length(field, posting.doc);
            let score = self
                .bm25
                .score(posting.term_frequency as f32, df, total_docs, doc_len, avgdl);
            scores.add(posting.doc, score * weight);
        }
        scores
    }

    /// BM25+ score of a single match given its frequency in the document
    pub fn score_occurrences(&self, field: Field, doc_len: u32, tf: u32, df: u32) -> f32 {
        self.bm25.score(
            tf as f32,
            df,
            self.total_docs(),
            doc_len,
            self.snapshot.avgdl(field),
        )
    }
}
