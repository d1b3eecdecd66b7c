//! Single writer owning every index mutation
//!
//! Adds, updates and deletes accumulate as pending state: a mutable buffer,
//! segments flushed from it, tombstones and a key overlay. None of it is
//! visible to readers until `commit`, which makes the whole batch durable as
//! one commit record and then installs a new snapshot in the commit point.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use roaring::RoaringBitmap;
use tracing::{debug, info, warn};

use super::reader::CommitPoint;
use super::snapshot::Snapshot;
use crate::config::{IndexConfig, WriterConfig};
use crate::error::DishdexError;
use crate::models::{ExternalKey, FieldValues, StoredDocument};
use crate::persistence::{CommitLog, CommitRecord, CommitStore, MemoryCommitStore, WriteOp, WriterLock};
use crate::segment::{merge_segments, DocId, MergePolicy, MergeReason, MutableBuffer, SegmentId, SegmentReader};
use crate::tokenizer::Tokenizer;
use crate::Result;

/// Outcome of a commit
#[derive(Clone, Debug, PartialEq)]
pub struct CommitInfo {
    /// Generation now held by the commit point
    pub generation: u64,
    /// Operations made durable by this commit (0 for a no-op commit)
    pub ops: usize,
    /// Segments in the committed snapshot
    pub segments: usize,
    pub merged: Option<MergeReason>,
}

/// The index writer
pub struct IndexWriter {
    config: WriterConfig,
    tokenizer: Tokenizer,
    store: Box<dyn CommitStore>,
    lock: Option<WriterLock>,
    commit_point: CommitPoint,
    merge_policy: MergePolicy,

    buffer: MutableBuffer,
    flushed: Vec<Arc<SegmentReader>>,
    pending_deletes: RoaringBitmap,
    /// Key changes since the last commit: `Some(doc)` now maps to doc, `None` was deleted
    pending_keys: HashMap<ExternalKey, Option<DocId>>,
    pending_ops: Vec<WriteOp>,

    next_doc: DocId,
    next_segment: SegmentId,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("store", &self.store)
            .field("generation", &self.generation())
            .field("pending_ops", &self.pending_ops.len())
            .field("next_doc", &self.next_doc)
            .finish()
    }
}

impl IndexWriter {
    /// Open the writer for `config`'s storage location
    ///
    /// A persistent index takes the writer lock first, failing with
    /// `WriteConflict` if another writer holds it, then replays the commit log.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        match (config.lock_path(), config.commit_log_path()) {
            (Some(lock_path), Some(log_path)) => {
                let lock = WriterLock::acquire(lock_path)?;
                let log = CommitLog::open(log_path)?;
                Self::with_store(config, Box::new(log), Some(lock))
            }
            _ => Self::with_store(config, Box::new(MemoryCommitStore), None),
        }
    }

    /// Open the writer over an explicit commit store, rebuilding committed
    /// state from the store's records
    pub fn with_store(config: &IndexConfig, mut store: Box<dyn CommitStore>, lock: Option<WriterLock>) -> Result<Self> {
        let tokenizer = Tokenizer::new(&config.tokenizer);
        let records = store.replay()?;

        let mut writer = Self {
            config: config.writer.clone(),
            tokenizer,
            store,
            lock,
            commit_point: Arc::new(ArcSwap::from_pointee(Snapshot::empty())),
            merge_policy: MergePolicy::new(&config.writer),
            buffer: MutableBuffer::new(),
            flushed: Vec::new(),
            pending_deletes: RoaringBitmap::new(),
            pending_keys: HashMap::new(),
            pending_ops: Vec::new(),
            next_doc: DocId::new(0),
            next_segment: SegmentId::new(1),
        };

        if !records.is_empty() {
            writer.recover(records)?;
        }
        Ok(writer)
    }

    /// Rebuild the committed snapshot from replayed records
    fn recover(&mut self, records: Vec<CommitRecord>) -> Result<()> {
        let id = self.allocate_segment_id();
        let (snapshot, next_doc) = replay_records(records, &self.tokenizer, id)?;
        self.next_doc = self.next_doc.max(next_doc);
        self.commit_point.store(Arc::new(snapshot));
        Ok(())
    }

    /// Shared commit point, read by the reader manager
    pub fn commit_point(&self) -> CommitPoint {
        Arc::clone(&self.commit_point)
    }

    /// Generation of the last successful commit
    pub fn generation(&self) -> u64 {
        self.commit_point.load().generation()
    }

    /// Operations waiting for the next commit
    pub fn pending_ops(&self) -> usize {
        self.pending_ops.len()
    }

    /// Documents in the mutable buffer
    pub fn buffered_docs(&self) -> usize {
        self.buffer.num_docs()
    }

    /// Segments flushed since the last commit
    pub fn flushed_segments(&self) -> usize {
        self.flushed.len()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending_ops.is_empty()
    }

    fn allocate_segment_id(&mut self) -> SegmentId {
        let id = self.next_segment;
        self.next_segment = id.next();
        id
    }

    /// Live document under `key`, including uncommitted changes
    fn live_doc_for_key(&self, key: &str) -> Option<DocId> {
        match self.pending_keys.get(key) {
            Some(pending) => *pending,
            None => self.commit_point.load().lookup_key(key),
        }
    }

    /// Add a document
    ///
    /// Documents with a blank name are skipped and `None` is returned. When
    /// `key` already maps to a live document, that document is replaced.
    pub fn add(&mut self, fields: FieldValues, key: Option<ExternalKey>) -> Result<Option<DocId>> {
        if !fields.has_required_fields() {
            debug!(key = ?key, "skipping document without a name");
            return Ok(None);
        }
        if self.next_doc == DocId::MAX {
            return Err(DishdexError::Internal("document id space exhausted".to_string()));
        }

        if let Some(key) = &key {
            if let Some(previous) = self.live_doc_for_key(key) {
                self.tombstone(previous);
            }
        }

        let doc = self.next_doc;
        self.next_doc = doc.next();

        if let Some(key) = &key {
            self.pending_keys.insert(key.clone(), Some(doc));
        }
        self.pending_ops.push(WriteOp::Add {
            doc,
            key: key.clone(),
            fields: fields.clone(),
        });
        self.buffer.index_document(doc, StoredDocument { key, fields }, &self.tokenizer);

        if self.buffer.should_flush(&self.config) {
            self.flush()?;
        }
        Ok(Some(doc))
    }

    /// Replace whatever document lives under `key` with `fields`
    ///
    /// The removal and the insertion become visible at the same commit. A
    /// blank name makes the whole update a no-op.
    pub fn update(&mut self, key: &str, fields: FieldValues) -> Result<Option<DocId>> {
        self.add(fields, Some(key.to_string()))
    }

    /// Delete the live document under `key`. Returns whether one existed.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let Some(doc) = self.live_doc_for_key(key) else {
            return Ok(false);
        };
        self.tombstone(doc);
        self.pending_keys.insert(key.to_string(), None);
        Ok(true)
    }

    fn tombstone(&mut self, doc: DocId) {
        if self.pending_deletes.insert(doc.as_u32()) {
            self.pending_ops.push(WriteOp::Delete { doc });
        }
    }

    /// Move buffered documents into an uncommitted segment
    pub fn flush(&mut self) -> Result<()> {
        let id = self.allocate_segment_id();
        if let Some(segment) = self.buffer.flush(id)? {
            debug!(segment = %id, docs = segment.doc_count(), "flushed buffer");
            self.flushed.push(Arc::new(segment));
        }
        Ok(())
    }

    /// Make every pending operation durable and visible to the next refresh
    ///
    /// On a commit store failure the pending operations are discarded, the
    /// commit point keeps the previous generation and `CommitFailure` is
    /// returned.
    pub fn commit(&mut self) -> Result<CommitInfo> {
        let current = self.commit_point.load_full();
        if self.pending_ops.is_empty() {
            return Ok(CommitInfo {
                generation: current.generation(),
                ops: 0,
                segments: current.segments().len(),
                merged: None,
            });
        }

        if let Err(e) = self.flush() {
            self.rollback();
            return Err(DishdexError::CommitFailure(e.to_string()));
        }

        let generation = current.generation() + 1;
        let record = CommitRecord {
            generation,
            ops: std::mem::take(&mut self.pending_ops),
        };
        let ops = record.ops.len();

        if let Err(e) = self.store.append(&record) {
            warn!(generation, error = %e, "commit failed, discarding pending changes");
            self.rollback();
            return Err(match e {
                DishdexError::CommitFailure(_) => e,
                other => DishdexError::CommitFailure(other.to_string()),
            });
        }

        let mut segments: Vec<Arc<SegmentReader>> = current.segments().to_vec();
        segments.append(&mut self.flushed);

        let mut tombstones = current.tombstones().clone();
        tombstones |= &self.pending_deletes;
        self.pending_deletes.clear();

        let mut keys = (**current.keys()).clone();
        for (key, doc) in self.pending_keys.drain() {
            match doc {
                Some(doc) => keys.insert(key, doc),
                None => keys.remove(&key),
            };
        }

        let mut merged = None;
        if let Some(reason) = self.merge_policy.find_merge(&segments, &tombstones) {
            let id = self.allocate_segment_id();
            match merge_segments(id, &segments, &tombstones) {
                Ok(segment) => {
                    info!(
                        reason = ?reason,
                        from = segments.len(),
                        purged = tombstones.len(),
                        docs = segment.doc_count(),
                        "merged segments"
                    );
                    segments = if segment.is_empty() {
                        Vec::new()
                    } else {
                        vec![Arc::new(segment)]
                    };
                    tombstones.clear();
                    merged = Some(reason);

                    // the merged segments hold the whole committed state, so they
                    // can stand in for the log's history
                    let compacted = compacted_record(generation, &segments, self.next_doc);
                    if let Err(e) = self.store.compact(&compacted) {
                        warn!(generation, error = %e, "commit log compaction failed, keeping full history");
                    }
                }
                Err(e) => warn!(error = %e, "segment merge failed, keeping unmerged segments"),
            }
        }

        let snapshot = Snapshot::new(generation, segments, tombstones, Arc::new(keys));
        let info = CommitInfo {
            generation,
            ops,
            segments: snapshot.segments().len(),
            merged,
        };
        debug!(
            generation,
            ops,
            segments = info.segments,
            live_docs = snapshot.live_doc_count(),
            "committed"
        );
        self.commit_point.store(Arc::new(snapshot));
        Ok(info)
    }

    /// Discard every operation since the last commit
    pub fn rollback(&mut self) {
        if !self.pending_ops.is_empty() || !self.buffer.is_empty() {
            debug!(ops = self.pending_ops.len(), "rolling back pending changes");
        }
        self.buffer.clear();
        self.flushed.clear();
        self.pending_deletes.clear();
        self.pending_keys.clear();
        self.pending_ops.clear();
    }

    /// Commit outstanding changes and release the writer lock
    pub fn close(mut self) -> Result<CommitInfo> {
        let info = self.commit()?;
        if let Some(lock) = self.lock.take() {
            drop(lock);
        }
        info!(generation = info.generation, "closed index writer");
        Ok(info)
    }
}

/// Build the committed snapshot described by `records`
///
/// Returns the snapshot and the first document id no record has used.
pub(crate) fn replay_records(
    records: Vec<CommitRecord>,
    tokenizer: &Tokenizer,
    segment: SegmentId,
) -> Result<(Snapshot, DocId)> {
    let mut buffer = MutableBuffer::new();
    let mut tombstones = RoaringBitmap::new();
    let mut keys: HashMap<ExternalKey, DocId> = HashMap::new();
    let mut next_doc = DocId::new(0);
    let mut generation = 0;
    let mut ops = 0usize;

    for record in records {
        generation = generation.max(record.generation);
        ops += record.ops.len();
        for op in record.ops {
            match op {
                WriteOp::Add { doc, key, fields } => {
                    if let Some(key) = &key {
                        keys.insert(key.clone(), doc);
                    }
                    buffer.index_document(doc, StoredDocument { key, fields }, tokenizer);
                    next_doc = next_doc.max(doc.next());
                }
                WriteOp::Delete { doc } => {
                    tombstones.insert(doc.as_u32());
                }
                WriteOp::Advance { next_doc: advanced } => {
                    next_doc = next_doc.max(advanced);
                }
            }
        }
    }

    // a key whose document was deleted is no longer live
    keys.retain(|_, doc| !tombstones.contains(doc.as_u32()));

    let mut segments = Vec::new();
    if let Some(flushed) = buffer.flush(segment)? {
        segments.push(Arc::new(flushed));
    }

    let snapshot = Snapshot::new(generation, segments, tombstones, Arc::new(keys));
    info!(
        generation,
        ops,
        live_docs = snapshot.live_doc_count(),
        "recovered index from commit log"
    );
    Ok((snapshot, next_doc))
}

/// Single record equivalent to the merged state: every live document plus the id watermark
fn compacted_record(generation: u64, segments: &[Arc<SegmentReader>], next_doc: DocId) -> CommitRecord {
    let mut ops: Vec<WriteOp> = segments
        .iter()
        .flat_map(|segment| segment.iter_documents())
        .map(|(doc, stored, _)| WriteOp::Add {
            doc,
            key: stored.key.clone(),
            fields: stored.fields.clone(),
        })
        .collect();
    ops.push(WriteOp::Advance { next_doc });
    CommitRecord { generation, ops }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[derive(Debug, Default)]
    struct FailingStore;

    impl CommitStore for FailingStore {
        fn append(&mut self, record: &CommitRecord) -> Result<()> {
            Err(DishdexError::CommitFailure(format!("disk full at generation {}", record.generation)))
        }

        fn replay(&mut self) -> Result<Vec<CommitRecord>> {
            Ok(Vec::new())
        }

        fn compact(&mut self, _record: &CommitRecord) -> Result<()> {
            Ok(())
        }
    }

    /// Keeps records in memory the way the log would
    #[derive(Debug, Default, Clone)]
    struct RecordingStore {
        records: Arc<parking_lot::Mutex<Vec<CommitRecord>>>,
    }

    impl CommitStore for RecordingStore {
        fn append(&mut self, record: &CommitRecord) -> Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }

        fn replay(&mut self) -> Result<Vec<CommitRecord>> {
            Ok(self.records.lock().clone())
        }

        fn compact(&mut self, record: &CommitRecord) -> Result<()> {
            *self.records.lock() = vec![record.clone()];
            Ok(())
        }
    }

    fn writer() -> IndexWriter {
        IndexWriter::open(&IndexConfig::in_memory()).unwrap()
    }

    fn fields(name: &str) -> FieldValues {
        FieldValues::new(name, "Mains")
    }

    #[test]
    fn test_blank_name_is_skipped() {
        let mut w = writer();
        assert_eq!(w.add(fields("  "), None).unwrap(), None);
        assert_eq!(w.pending_ops(), 0);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut w = writer();
        let a = w.add(fields("Pizza"), None).unwrap().unwrap();
        let b = w.add(fields("Ramen"), None).unwrap().unwrap();
        w.rollback();
        let c = w.add(fields("Tacos"), None).unwrap().unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_nothing_visible_before_commit() {
        let mut w = writer();
        w.add(fields("Pizza"), None).unwrap();
        assert_eq!(w.commit_point().load().live_doc_count(), 0);

        let info = w.commit().unwrap();
        assert_eq!(info.generation, 1);
        assert_eq!(info.ops, 1);
        let snap = w.commit_point().load_full();
        assert_eq!(snap.live_doc_count(), 1);
        assert_eq!(snap.doc_frequency(Field::Name, "pizza"), 1);
    }

    #[test]
    fn test_empty_commit_keeps_generation() {
        let mut w = writer();
        let info = w.commit().unwrap();
        assert_eq!(info.generation, 0);
        assert_eq!(info.ops, 0);
    }

    #[test]
    fn test_update_replaces_live_document() {
        let mut w = writer();
        let old = w.add(fields("Veggie Burger"), Some("k1".into())).unwrap().unwrap();
        w.commit().unwrap();

        let new = w.update("k1", fields("Tofu Wrap")).unwrap().unwrap();
        // not visible until commit
        assert_eq!(w.commit_point().load().lookup_key("k1"), Some(old));
        w.commit().unwrap();

        let snap = w.commit_point().load_full();
        assert_eq!(snap.lookup_key("k1"), Some(new));
        assert!(snap.document(old).is_none());
        assert_eq!(snap.document(new).unwrap().fields.name, "Tofu Wrap");
        assert_eq!(snap.live_doc_count(), 1);
    }

    #[test]
    fn test_update_with_blank_name_keeps_old() {
        let mut w = writer();
        let old = w.add(fields("Veggie Burger"), Some("k1".into())).unwrap().unwrap();
        w.commit().unwrap();

        assert_eq!(w.update("k1", fields("")).unwrap(), None);
        w.commit().unwrap();
        assert_eq!(w.commit_point().load().lookup_key("k1"), Some(old));
    }

    #[test]
    fn test_update_twice_in_one_commit() {
        let mut w = writer();
        w.update("k1", fields("First")).unwrap();
        let second = w.update("k1", fields("Second")).unwrap().unwrap();
        w.commit().unwrap();

        let snap = w.commit_point().load_full();
        assert_eq!(snap.live_doc_count(), 1);
        assert_eq!(snap.lookup_key("k1"), Some(second));
    }

    #[test]
    fn test_delete() {
        let mut w = writer();
        let doc = w.add(fields("Pad Thai"), Some("k9".into())).unwrap().unwrap();
        w.commit().unwrap();

        assert!(w.delete("k9").unwrap());
        assert!(!w.delete("k9").unwrap());
        assert!(!w.delete("missing").unwrap());
        w.commit().unwrap();

        let snap = w.commit_point().load_full();
        assert!(snap.document(doc).is_none());
        assert!(snap.lookup_key("k9").is_none());
        assert_eq!(snap.doc_frequency(Field::Name, "thai"), 0);
    }

    #[test]
    fn test_rollback_discards_pending() {
        let mut w = writer();
        w.add(fields("Pizza"), Some("a".into())).unwrap();
        w.commit().unwrap();

        w.add(fields("Ramen"), None).unwrap();
        w.delete("a").unwrap();
        w.rollback();
        w.commit().unwrap();

        let snap = w.commit_point().load_full();
        assert_eq!(snap.generation(), 1);
        assert_eq!(snap.live_doc_count(), 1);
        assert!(snap.lookup_key("a").is_some());
    }

    #[test]
    fn test_implicit_flush_stays_invisible() {
        let config = IndexConfig::in_memory().with_max_buffered_docs(2);
        let mut w = IndexWriter::open(&config).unwrap();
        for name in ["Pizza", "Ramen", "Tacos"] {
            w.add(fields(name), None).unwrap();
        }
        assert_eq!(w.flushed_segments(), 1);
        assert_eq!(w.buffered_docs(), 1);
        assert_eq!(w.commit_point().load().live_doc_count(), 0);

        let info = w.commit().unwrap();
        assert_eq!(info.segments, 2);
        assert_eq!(w.commit_point().load().live_doc_count(), 3);
    }

    #[test]
    fn test_commit_failure_leaves_previous_state() {
        let mut w = IndexWriter::with_store(&IndexConfig::in_memory(), Box::new(FailingStore), None).unwrap();
        w.add(fields("Pizza"), Some("p".into())).unwrap();

        let err = w.commit().unwrap_err();
        assert!(matches!(err, DishdexError::CommitFailure(_)));
        assert!(err.is_retriable());

        let snap = w.commit_point().load_full();
        assert_eq!(snap.generation(), 0);
        assert_eq!(snap.live_doc_count(), 0);
        assert_eq!(w.pending_ops(), 0);
        assert_eq!(w.flushed_segments(), 0);
    }

    #[test]
    fn test_merge_when_too_many_segments() {
        let config = IndexConfig::in_memory().with_max_segments(2);
        let mut w = IndexWriter::open(&config).unwrap();
        w.add(fields("Pizza"), Some("a".into())).unwrap();
        w.commit().unwrap();
        w.add(fields("Ramen"), None).unwrap();
        w.commit().unwrap();
        w.delete("a").unwrap();
        w.add(fields("Tacos"), None).unwrap();
        let info = w.commit().unwrap();

        assert_eq!(info.merged, Some(MergeReason::TooManySegments));
        assert_eq!(info.segments, 1);
        let snap = w.commit_point().load_full();
        assert!(snap.tombstones().is_empty());
        assert_eq!(snap.live_doc_count(), 2);
        assert_eq!(snap.doc_count(), 2);
    }

    #[test]
    fn test_merge_compacts_history() {
        let store = RecordingStore::default();
        let mut w = IndexWriter::with_store(&IndexConfig::in_memory(), Box::new(store.clone()), None).unwrap();
        w.add(fields("Pizza"), Some("p".into())).unwrap();
        w.commit().unwrap();

        let mut last = None;
        for round in 0..10 {
            last = w.update("k", fields(&format!("Ramen {round}"))).unwrap();
            let info = w.commit().unwrap();
            if info.merged.is_some() {
                assert_eq!(store.records.lock().len(), 1);
            }
        }
        assert!(store.records.lock().len() <= 2);

        let generation = w.generation();
        drop(w);

        let mut reopened = IndexWriter::with_store(&IndexConfig::in_memory(), Box::new(store.clone()), None).unwrap();
        let snap = reopened.commit_point().load_full();
        assert_eq!(snap.generation(), generation);
        assert_eq!(snap.live_doc_count(), 2);
        assert_eq!(snap.lookup_key("k"), last);
        assert_eq!(snap.document(last.unwrap()).unwrap().fields.name, "Ramen 9");

        // deleting the newest document merges it away; its id stays spent
        assert!(reopened.delete("k").unwrap());
        assert!(reopened.commit().unwrap().merged.is_some());
        drop(reopened);

        let mut reopened = IndexWriter::with_store(&IndexConfig::in_memory(), Box::new(store), None).unwrap();
        let fresh = reopened.add(fields("Tacos"), None).unwrap().unwrap();
        assert!(fresh > last.unwrap());
    }
}
