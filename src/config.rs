use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::segment::Bm25Params;

/// Index-time tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            min_token_length: 1,
            max_token_length: 64,
        }
    }
}

/// Writer buffering and merge settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Implicit flush once this many documents are buffered
    pub max_buffered_docs: usize,
    /// Implicit flush once the buffer's approximate size reaches this many bytes
    pub max_buffer_bytes: usize,
    /// Merge all segments into one when a commit leaves more than this many
    pub max_segments: usize,
    /// Merge when tombstones exceed this share of indexed documents
    pub max_delete_ratio: f64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_buffered_docs: 1_000,
            max_buffer_bytes: 16 * 1024 * 1024,
            max_segments: 8,
            max_delete_ratio: 0.3,
        }
    }
}

/// Query construction and ranking settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_results: usize,
    pub fuzzy_max_edits: u32,
    pub fuzzy_max_expansions: usize,
    pub prefix_boost: f32,
    pub phrase_boost: f32,
    pub phrase_slop: u32,
    pub bm25: Bm25Params,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 50,
            fuzzy_max_edits: 2,
            fuzzy_max_expansions: 50,
            prefix_boost: 1.5,
            phrase_boost: 3.0,
            phrase_slop: 0,
            bm25: Bm25Params::default(),
        }
    }
}

/// Top-level index configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Storage location for the commit log and lock file; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    pub writer: WriterConfig,
    pub search: SearchConfig,
    pub tokenizer: TokenizerConfig,
}

impl IndexConfig {
    /// In-memory index with default settings
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Durable index rooted at `data_dir`
    pub fn persistent(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Default::default()
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.search.max_results = max_results;
        self
    }

    pub fn with_max_buffered_docs(mut self, docs: usize) -> Self {
        self.writer.max_buffered_docs = docs;
        self
    }

    pub fn with_max_buffer_bytes(mut self, bytes: usize) -> Self {
        self.writer.max_buffer_bytes = bytes;
        self
    }

    pub fn with_max_segments(mut self, segments: usize) -> Self {
        self.writer.max_segments = segments.max(1);
        self
    }

    pub fn with_fuzzy_max_edits(mut self, edits: u32) -> Self {
        self.search.fuzzy_max_edits = edits;
        self
    }

    /// Path of the commit log, if the index is persistent
    pub fn commit_log_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("commits.log"))
    }

    /// Path of the writer lock token, if the index is persistent
    pub fn lock_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("write.lock"))
    }
}
