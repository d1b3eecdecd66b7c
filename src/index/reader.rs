//! Near-real-time snapshot publication
//!
//! The writer installs each committed snapshot into a shared commit point.
//! The reader manager publishes it to searchers on `maybe_refresh`, which is
//! a pointer swap and never waits for in-flight readers.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use super::snapshot::{Snapshot, SnapshotHandle};

/// Latest committed snapshot, shared between writer and reader manager
pub type CommitPoint = Arc<ArcSwap<Snapshot>>;

/// Hands out reference-counted handles on the published snapshot
#[derive(Debug)]
pub struct ReaderManager {
    commit_point: CommitPoint,
    current: ArcSwap<Snapshot>,
}

impl ReaderManager {
    /// Create a manager publishing whatever the commit point holds now
    pub fn new(commit_point: CommitPoint) -> Self {
        let current = ArcSwap::new(commit_point.load_full());
        Self {
            commit_point,
            current,
        }
    }

    /// Handle on the most recently published snapshot
    pub fn acquire(&self) -> SnapshotHandle {
        SnapshotHandle::new(self.current.load_full())
    }

    /// Give a handle back. Equivalent to dropping it.
    pub fn release(&self, handle: SnapshotHandle) {
        drop(handle);
    }

    /// Publish the writer's latest commit if it is newer than the published one
    ///
    /// Returns whether a new snapshot was published.
    pub fn maybe_refresh(&self) -> bool {
        let committed = self.commit_point.load_full();
        let previous = self.current.rcu(|current| {
            if committed.generation() > current.generation() {
                Arc::clone(&committed)
            } else {
                Arc::clone(current)
            }
        });

        let refreshed = committed.generation() > previous.generation();
        if refreshed {
            debug!(
                from = previous.generation(),
                to = committed.generation(),
                readers_on_previous = previous.readers(),
                "published snapshot"
            );
        }
        refreshed
    }

    /// Generation of the published snapshot
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }
}
