//! Field statistics for BM25+ scoring
//!
//! Each segment records per-document field lengths. Snapshots aggregate
//! them over live documents so idf and average length ignore tombstones.

use serde::{Deserialize, Serialize};

/// BM25+ parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation parameter
    pub k1: f32,
    /// Length normalization parameter
    pub b: f32,
    /// BM25+ delta parameter (avoids zero scores for high-frequency terms)
    pub delta: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            delta: 1.0,
        }
    }
}

impl Bm25Params {
    /// IDF with the Robertson-Sparck-Jones formula
    pub fn idf(&self, df: u32, total_docs: u32) -> f32 {
        let n = total_docs as f32;
        let df = df as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// BM25+ score for one term occurrence in one document
    pub fn score(&self, tf: f32, df: u32, total_docs: u32, doc_len: u32, avgdl: f32) -> f32 {
        if avgdl == 0.0 || total_docs == 0 {
            return 0.0;
        }

        let idf = self.idf(df, total_docs);
        let norm = 1.0 - self.b + self.b * (doc_len as f32 / avgdl);
        let tf_component = (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm);
        idf * (tf_component + self.delta)
    }
}

/// Aggregate length statistics of one field
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStatistics {
    /// Number of documents counted
    pub doc_count: u32,
    /// Sum of field lengths in tokens
    pub total_length: u64,
}

impl FieldStatistics {
    pub fn add(&mut self, length: u32) {
        self.doc_count += 1;
        self.total_length += length as u64;
    }

    pub fn merge(&mut self, other: &FieldStatistics) {
        self.doc_count += other.doc_count;
        self.total_length += other.total_length;
    }

    /// Average field length
    pub fn avgdl(&self) -> f32 {
        if self.doc_count == 0 {
            0.0
        } else {
            (self.total_length as f64 / self.doc_count as f64) as f32
        }
    }
}
