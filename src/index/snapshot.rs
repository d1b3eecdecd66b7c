//! Immutable point-in-time views of the index
//!
//! A [`Snapshot`] is built by the writer at commit time and never mutated
//! afterwards. Readers hold it through a [`SnapshotHandle`], which keeps the
//! snapshot's reader count and releases it on drop, whatever path the
//! holder leaves by.

use std::collections::{BTreeSet, HashMap};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use roaring::RoaringBitmap;
use tracing::debug;

use crate::models::{ExternalKey, StoredDocument};
use crate::schema::Field;
use crate::segment::{DocId, FieldStatistics, Posting, SegmentReader};

/// Immutable, queryable view of one commit generation
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    segments: Vec<Arc<SegmentReader>>,
    tombstones: RoaringBitmap,
    /// External key -> live document
    keys: Arc<HashMap<ExternalKey, DocId>>,
    /// Length statistics over live documents only
    field_stats: [FieldStatistics; Field::COUNT],
    live_docs: u32,
    readers: AtomicUsize,
}

impl Snapshot {
    /// Snapshot of an index with no commits
    pub fn empty() -> Self {
        Self::new(0, Vec::new(), RoaringBitmap::new(), Arc::new(HashMap::new()))
    }

    /// Assemble a snapshot, computing live-document statistics
    ///
    /// `segments` must be ordered by document id and `tombstones` must only
    /// hold ids present in them.
    pub fn new(
        generation: u64,
        segments: Vec<Arc<SegmentReader>>,
        tombstones: RoaringBitmap,
        keys: Arc<HashMap<ExternalKey, DocId>>,
    ) -> Self {
        let mut field_stats = [FieldStatistics::default(); Field::COUNT];
        let mut total_docs = 0u32;

        for segment in &segments {
            total_docs += segment.doc_count();
            for field in Field::ALL {
                field_stats[field.ordinal()].merge(segment.field(field).stats());
            }
        }

        let mut deleted = 0u32;
        for doc in tombstones.iter().map(DocId::new) {
            let Some(segment) = segments.iter().find(|s| s.contains(doc)) else {
                continue;
            };
            deleted += 1;
            for field in Field::ALL {
                let stats = &mut field_stats[field.ordinal()];
                let len = segment.field_length(field, doc).unwrap_or(0) as u64;
                stats.doc_count = stats.doc_count.saturating_sub(1);
                stats.total_length = stats.total_length.saturating_sub(len);
            }
        }

        Self {
            generation,
            segments,
            tombstones,
            keys,
            field_stats,
            live_docs: total_docs - deleted,
            readers: AtomicUsize::new(0),
        }
    }

    /// Commit generation this snapshot reflects
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn segments(&self) -> &[Arc<SegmentReader>] {
        &self.segments
    }

    pub fn tombstones(&self) -> &RoaringBitmap {
        &self.tombstones
    }

    pub fn keys(&self) -> &Arc<HashMap<ExternalKey, DocId>> {
        &self.keys
    }

    /// Live document currently stored under an external key
    pub fn lookup_key(&self, key: &str) -> Option<DocId> {
        self.keys.get(key).copied()
    }

    /// Number of live documents
    pub fn live_doc_count(&self) -> u32 {
        self.live_docs
    }

    /// Number of indexed documents, tombstones included
    pub fn doc_count(&self) -> u32 {
        self.segments.iter().map(|s| s.doc_count()).sum()
    }

    pub fn is_live(&self, doc: DocId) -> bool {
        !self.tombstones.contains(doc.as_u32())
    }

    pub fn field_stats(&self, field: Field) -> &FieldStatistics {
        &self.field_stats[field.ordinal()]
    }

    /// Average length of `field` over live documents
    pub fn avgdl(&self, field: Field) -> f32 {
        self.field_stats(field).avgdl()
    }

    fn segment_of(&self, doc: DocId) -> Option<&SegmentReader> {
        self.segments
            .iter()
            .find(|s| {
                let meta = s.meta();
                meta.min_doc <= doc && doc <= meta.max_doc && s.contains(doc)
            })
            .map(|s| s.as_ref())
    }

    /// Stored fields of a live document
    pub fn document(&self, doc: DocId) -> Option<&StoredDocument> {
        if !self.is_live(doc) {
            return None;
        }
        self.segment_of(doc).and_then(|s| s.document(doc))
    }

    /// Length of a document's field in tokens
    pub fn field_length(&self, field: Field, doc: DocId) -> u32 {
        self.segment_of(doc)
            .and_then(|s| s.field_length(field, doc))
            .unwrap_or(0)
    }

    /// Live postings of an exact term, in document order
    pub fn postings<'a>(&'a self, field: Field, term: &'a str) -> impl Iterator<Item = &'a Posting> + 'a {
        self.segments
            .iter()
            .filter_map(move |s| s.postings(field, term))
            .flat_map(|list| list.iter())
            .filter(move |p| self.is_live(p.doc))
    }

    /// Number of live documents containing a term
    pub fn doc_frequency(&self, field: Field, term: &str) -> u32 {
        self.postings(field, term).count() as u32
    }

    /// Distinct terms of `field` starting with `prefix`, across all segments
    pub fn terms_with_prefix(&self, field: Field, prefix: &str) -> BTreeSet<String> {
        self.segments
            .iter()
            .flat_map(|s| s.field(field).terms().prefix_search(prefix))
            .map(|(term, _)| term)
            .collect()
    }

    /// Every distinct term of `field`
    pub fn all_terms(&self, field: Field) -> BTreeSet<String> {
        self.terms_with_prefix(field, "")
    }

    /// Number of outstanding handles on this snapshot
    pub fn readers(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if self.generation > 0 {
            debug!(generation = self.generation, "reclaiming snapshot");
        }
    }
}

/// Reference-counted handle on a published snapshot
///
/// Dropping the handle releases it.
#[derive(Debug)]
pub struct SnapshotHandle {
    snapshot: Arc<Snapshot>,
}

impl SnapshotHandle {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        snapshot.readers.fetch_add(1, Ordering::AcqRel);
        Self { snapshot }
    }

    /// Shared pointer to the underlying snapshot
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }
}

impl Deref for SnapshotHandle {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl Clone for SnapshotHandle {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.snapshot))
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        self.snapshot.readers.fetch_sub(1, Ordering::AcqRel);
    }
}
