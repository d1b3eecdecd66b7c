//! Persistence primitives: the append-only commit log and the writer lock.

mod commit_log;
mod lock;

pub use commit_log::{CommitLog, CommitRecord, CommitStore, MemoryCommitStore, WriteOp};
pub use lock::WriterLock;
