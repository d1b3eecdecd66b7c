//! Process-wide owner of one catalog index
//!
//! The manager holds the single writer behind a mutex and the reader
//! manager beside it. Writes go through the writer, commit, then refresh;
//! searches only ever touch a snapshot handle, released on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::reader::{CommitPoint, ReaderManager};
use super::snapshot::{Snapshot, SnapshotHandle};
use super::writer::{replay_records, CommitInfo, IndexWriter};
use crate::config::IndexConfig;
use crate::error::DishdexError;
use crate::models::{BatchReceipt, CatalogRecord, FieldValues, IndexReceipt, SearchHit, SearchResponse};
use crate::persistence::{CommitLog, WriterLock};
use crate::query::{QueryBuilder, QueryContext, QueryExecutor};
use crate::segment::{DocId, SegmentId};
use crate::tokenizer::{PreparedQuery, QueryPreprocessor, Tokenizer};
use crate::Result;

/// Point-in-time index statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Published generation
    pub generation: u64,
    pub live_docs: u32,
    /// Documents held by segments, deleted ones included
    pub total_docs: u32,
    pub segments: usize,
    pub tombstones: u64,
    /// Operations not yet committed
    pub pending_ops: usize,
    pub is_open: bool,
}

/// Owner of the writer, the reader manager and the query pipeline
pub struct IndexManager {
    config: IndexConfig,
    writer: Mutex<Option<IndexWriter>>,
    readers: ReaderManager,
    preprocessor: QueryPreprocessor,
    tokenizer: Tokenizer,
    builder: QueryBuilder,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("data_dir", &self.config.data_dir)
            .field("generation", &self.readers.generation())
            .finish()
    }
}

impl IndexManager {
    /// Open the index described by `config`
    ///
    /// Persistent indexes take the writer lock and replay their commit log;
    /// the recovered state is published before this returns.
    pub fn open(config: IndexConfig) -> Result<Self> {
        let writer = IndexWriter::open(&config)?;
        let readers = ReaderManager::new(writer.commit_point());

        info!(
            data_dir = ?config.data_dir,
            generation = readers.generation(),
            "opened index"
        );

        Ok(Self {
            tokenizer: Tokenizer::new(&config.tokenizer),
            builder: QueryBuilder::new(&config.search),
            preprocessor: QueryPreprocessor::new(),
            writer: Mutex::new(Some(writer)),
            readers,
            config,
        })
    }

    /// Open the committed state of `config`'s index for searching only
    ///
    /// No writer lock is taken, so this works beside a running writer. The
    /// commit log is read once and never modified; mutations fail with
    /// `Closed`.
    pub fn open_read_only(config: IndexConfig) -> Result<Self> {
        let tokenizer = Tokenizer::new(&config.tokenizer);
        let snapshot = match config.commit_log_path() {
            Some(path) => {
                let records = CommitLog::read_records(&path)?;
                replay_records(records, &tokenizer, SegmentId::new(1))?.0
            }
            None => Snapshot::empty(),
        };
        let commit_point: CommitPoint = Arc::new(ArcSwap::from_pointee(snapshot));
        let readers = ReaderManager::new(commit_point);

        info!(
            data_dir = ?config.data_dir,
            generation = readers.generation(),
            "opened index read-only"
        );

        Ok(Self {
            tokenizer,
            builder: QueryBuilder::new(&config.search),
            preprocessor: QueryPreprocessor::new(),
            writer: Mutex::new(None),
            readers,
            config,
        })
    }

    /// Remove a lock token left behind by a writer that did not shut down
    ///
    /// Returns whether a token was removed. Only safe when no other process
    /// is writing to the index.
    pub fn force_unlock(config: &IndexConfig) -> Result<bool> {
        match config.lock_path() {
            Some(path) => WriterLock::force_unlock(path),
            None => Ok(false),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Commit pending changes and release the writer
    ///
    /// Searches keep working on the last published snapshot; mutations
    /// fail with `Closed`. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let Some(writer) = self.writer.lock().take() else {
            return Ok(());
        };
        writer.close()?;
        self.readers.maybe_refresh();
        Ok(())
    }

    fn with_writer<T>(&self, f: impl FnOnce(&mut IndexWriter) -> Result<T>) -> Result<T> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(DishdexError::Closed)?;
        f(writer)
    }

    /// Index one record and make it searchable
    ///
    /// A record with a key replaces the live document under that key. A
    /// blank name is not an error: nothing is written and `accepted` is false.
    pub fn index(&self, record: &CatalogRecord) -> Result<IndexReceipt> {
        let doc = self.with_writer(|writer| {
            let Some(doc) = writer.add(record.fields(), record.key.clone())? else {
                return Ok(None);
            };
            writer.commit()?;
            Ok(Some(doc))
        })?;

        match doc {
            Some(doc) => {
                self.readers.maybe_refresh();
                Ok(IndexReceipt::accepted(doc))
            }
            None => Ok(IndexReceipt::skipped()),
        }
    }

    /// Index many records under a single commit
    pub fn index_batch<'a, I>(&self, records: I) -> Result<BatchReceipt>
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let receipt = self.with_writer(|writer| {
            let mut receipt = BatchReceipt::default();
            for record in records {
                match writer.add(record.fields(), record.key.clone())? {
                    Some(_) => receipt.accepted += 1,
                    None => receipt.skipped += 1,
                }
            }
            receipt.generation = writer.commit()?.generation;
            Ok(receipt)
        })?;

        self.readers.maybe_refresh();
        info!(
            accepted = receipt.accepted,
            skipped = receipt.skipped,
            generation = receipt.generation,
            "indexed batch"
        );
        Ok(receipt)
    }

    /// Buffer a document without committing
    pub fn add(&self, fields: FieldValues, key: Option<String>) -> Result<Option<DocId>> {
        self.with_writer(|writer| writer.add(fields, key))
    }

    /// Buffer a replacement of the document under `key` without committing
    pub fn update(&self, key: &str, fields: FieldValues) -> Result<Option<DocId>> {
        self.with_writer(|writer| writer.update(key, fields))
    }

    /// Buffer a delete of the document under `key` without committing
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.with_writer(|writer| writer.delete(key))
    }

    /// Commit buffered changes and publish them
    pub fn commit(&self) -> Result<CommitInfo> {
        let info = self.with_writer(|writer| writer.commit())?;
        self.readers.maybe_refresh();
        Ok(info)
    }

    /// Discard buffered changes
    pub fn rollback(&self) -> Result<()> {
        self.with_writer(|writer| {
            writer.rollback();
            Ok(())
        })
    }

    /// Publish the latest commit to new searches
    pub fn maybe_refresh(&self) -> bool {
        self.readers.maybe_refresh()
    }

    /// Handle on the published snapshot
    pub fn acquire(&self) -> SnapshotHandle {
        self.readers.acquire()
    }

    pub fn release(&self, handle: SnapshotHandle) {
        self.readers.release(handle)
    }

    pub fn stats(&self) -> IndexStats {
        let pending_ops = self.writer.lock().as_ref().map(|w| w.pending_ops());
        let snapshot = self.readers.acquire();
        IndexStats {
            generation: snapshot.generation(),
            live_docs: snapshot.live_doc_count(),
            total_docs: snapshot.doc_count(),
            segments: snapshot.segments().len(),
            tombstones: snapshot.tombstones().len(),
            pending_ops: pending_ops.unwrap_or(0),
            is_open: pending_ops.is_some(),
        }
    }

    /// Ranked search over the published snapshot
    ///
    /// Blank and stopword-only queries return an empty response without
    /// touching the index. A malformed query returns an empty response
    /// carrying the error detail.
    pub fn search(&self, query: &str) -> Result<SearchResponse> {
        self.run_search(query, None)
    }

    /// Like [`search`](Self::search), failing with `SearchTimeout` once
    /// `timeout` has elapsed
    pub fn search_with_timeout(&self, query: &str, timeout: Duration) -> Result<SearchResponse> {
        self.run_search(query, Some(timeout))
    }

    /// Query tokens with the word position each would occupy in catalog text
    fn query_terms(&self, prepared: &PreparedQuery) -> Vec<(String, u32)> {
        let mut terms = Vec::new();
        let mut position = 0u32;
        for (word, gap) in prepared.words() {
            position += gap;
            for (token, offset) in self.tokenizer.tokenize_with_positions_ordered(word) {
                terms.push((token, position + offset));
            }
            position += self.tokenizer.word_count(word);
        }
        terms
    }

    fn run_search(&self, query: &str, timeout: Option<Duration>) -> Result<SearchResponse> {
        let started = Instant::now();

        let prepared = self.preprocessor.prepare(query);
        let tokens = self.query_terms(&prepared);
        if tokens.is_empty() {
            return Ok(SearchResponse::empty());
        }

        let node = match self.builder.build(&tokens, prepared.optional_plural) {
            Ok(node) => node,
            Err(DishdexError::QueryParse(detail)) => return Ok(SearchResponse::failed(detail)),
            Err(e) => return Err(e),
        };

        let handle = self.readers.acquire();
        let mut ctx = QueryContext::new(&handle).with_bm25(self.config.search.bm25.clone());
        if let Some(timeout) = timeout {
            ctx = ctx.with_timeout(timeout);
        }

        let result = match QueryExecutor::execute(node.as_ref(), &ctx, self.config.search.max_results) {
            Ok(result) => result,
            Err(DishdexError::QueryParse(detail)) => return Ok(SearchResponse::failed(detail)),
            Err(e) => return Err(e),
        };

        let hits: Vec<SearchHit> = result
            .hits
            .iter()
            .filter_map(|hit| {
                let stored = handle.document(hit.doc)?;
                Some(SearchHit {
                    doc_id: hit.doc,
                    key: stored.key.clone(),
                    name: stored.fields.name.clone(),
                    category: stored.fields.category.clone(),
                    score: hit.score,
                })
            })
            .collect();

        let took_ms = started.elapsed().as_millis() as u64;
        debug!(
            query,
            generation = handle.generation(),
            matched = result.total_hits,
            returned = hits.len(),
            took_ms,
            "search"
        );
        Ok(SearchResponse::new(hits, took_ms))
    }
}

impl Drop for IndexManager {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.get_mut().take() {
            if let Err(e) = writer.close() {
                warn!(error = %e, "failed to close index writer");
            }
        }
    }
}
