//! Index lifecycle: single writer, immutable snapshots and their publication

mod manager;
mod reader;
mod snapshot;
mod writer;

pub use manager::{IndexManager, IndexStats};
pub use reader::{CommitPoint, ReaderManager};
pub use snapshot::{Snapshot, SnapshotHandle};
pub use writer::{CommitInfo, IndexWriter};
