use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DishdexError;
use crate::models::{ExternalKey, FieldValues};
use crate::segment::DocId;
use crate::Result;

const HEADER_LEN: usize = 8;

/// A single mutation carried by a commit record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    Add {
        doc: DocId,
        key: Option<ExternalKey>,
        fields: FieldValues,
    },
    Delete {
        doc: DocId,
    },
    /// Doc ids below `next_doc` are spent even if no live document holds them
    Advance {
        next_doc: DocId,
    },
}

/// Every operation made durable by one commit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub generation: u64,
    pub ops: Vec<WriteOp>,
}

/// Durable sink for commit records
///
/// `append` must either persist the whole record or leave the store as it
/// was before the call.
pub trait CommitStore: Send + fmt::Debug {
    fn append(&mut self, record: &CommitRecord) -> Result<()>;

    /// Every intact record, oldest first
    fn replay(&mut self) -> Result<Vec<CommitRecord>>;

    /// Replace every stored record with `record`
    ///
    /// On error the previous records must still be intact.
    fn compact(&mut self, record: &CommitRecord) -> Result<()>;
}

/// Store for indexes without a data directory
#[derive(Debug, Default)]
pub struct MemoryCommitStore;

impl CommitStore for MemoryCommitStore {
    fn append(&mut self, _record: &CommitRecord) -> Result<()> {
        Ok(())
    }

    fn replay(&mut self) -> Result<Vec<CommitRecord>> {
        Ok(Vec::new())
    }

    fn compact(&mut self, _record: &CommitRecord) -> Result<()> {
        Ok(())
    }
}

/// Append-only commit log.
///
/// Record format:
/// - u32 length (little endian)
/// - u32 crc32 of payload
/// - bincode-encoded [`CommitRecord`]
pub struct CommitLog {
    path: PathBuf,
    file: File,
}

impl fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitLog").field("path", &self.path).finish()
    }
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u32;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&checksum(payload).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Decode intact records from the start of `data`
///
/// Returns the records and the length of the intact prefix. A torn or
/// checksum-failing final record ends the prefix; damage before the last
/// record is corruption.
fn decode_records(data: &[u8]) -> Result<(Vec<CommitRecord>, usize)> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        let remaining = data.len() - offset;
        if remaining < HEADER_LEN {
            break;
        }

        let len = u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]) as usize;
        let stored_crc = u32::from_le_bytes([data[offset + 4], data[offset + 5], data[offset + 6], data[offset + 7]]);
        let end = offset + HEADER_LEN + len;
        if end > data.len() {
            break;
        }

        let payload = &data[offset + HEADER_LEN..end];
        if checksum(payload) != stored_crc {
            if end == data.len() {
                break;
            }
            return Err(DishdexError::Corrupt {
                offset: offset as u64,
                reason: "checksum mismatch".to_string(),
            });
        }

        let record: CommitRecord = bincode::deserialize(payload).map_err(|e| DishdexError::Corrupt {
            offset: offset as u64,
            reason: e.to_string(),
        })?;
        records.push(record);
        offset = end;
    }

    Ok((records, offset))
}

impl CommitLog {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DishdexError::Io)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(DishdexError::Io)?;

        Ok(Self { path, file })
    }

    /// Current size of the log in bytes
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn write_record(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.file.write_all(&frame(payload))?;
        self.file.sync_data()
    }

    /// Read intact records from the log at `path` without opening it for writing
    ///
    /// A missing log reads as empty and a torn tail is ignored, not truncated.
    pub fn read_records(path: &Path) -> Result<Vec<CommitRecord>> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DishdexError::Io(e)),
        };
        let (records, intact) = decode_records(&data)?;
        if intact < data.len() {
            debug!(
                path = %path.display(),
                discarded = data.len() - intact,
                "ignoring torn commit log tail"
            );
        }
        Ok(records)
    }

    fn compact_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".compact");
        self.path.with_file_name(name)
    }

    fn write_compacted(&self, tmp_path: &Path, payload: &[u8]) -> std::io::Result<File> {
        {
            let mut tmp = File::create(tmp_path)?;
            tmp.write_all(&frame(payload))?;
            tmp.sync_all()?;
        }
        std::fs::rename(tmp_path, &self.path)?;

        if let Some(parent) = self.path.parent() {
            // directory fsync makes the rename durable; not every platform allows it
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        OpenOptions::new().read(true).append(true).open(&self.path)
    }
}

impl CommitStore for CommitLog {
    fn append(&mut self, record: &CommitRecord) -> Result<()> {
        let payload = bincode::serialize(record)?;
        let offset = self.len()?;

        if let Err(e) = self.write_record(&payload) {
            // roll the file back so a torn record never precedes a later one
            if let Err(truncate_err) = self.file.set_len(offset) {
                warn!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "failed to truncate commit log after write error"
                );
            }
            return Err(DishdexError::CommitFailure(format!(
                "generation {}: {}",
                record.generation, e
            )));
        }

        debug!(
            generation = record.generation,
            ops = record.ops.len(),
            bytes = payload.len(),
            "appended commit record"
        );
        Ok(())
    }

    fn replay(&mut self) -> Result<Vec<CommitRecord>> {
        let mut data = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut data)?;

        let (records, offset) = decode_records(&data)?;

        if offset < data.len() {
            warn!(
                path = %self.path.display(),
                offset,
                discarded = data.len() - offset,
                "discarding torn commit log tail"
            );
            self.file.set_len(offset as u64)?;
            self.file.sync_data()?;
        }

        Ok(records)
    }

    fn compact(&mut self, record: &CommitRecord) -> Result<()> {
        let payload = bincode::serialize(record)?;
        let tmp_path = self.compact_path();
        let before = self.len()?;

        match self.write_compacted(&tmp_path, &payload) {
            Ok(file) => {
                self.file = file;
                debug!(
                    generation = record.generation,
                    before,
                    after = HEADER_LEN + payload.len(),
                    "compacted commit log"
                );
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(DishdexError::CommitFailure(format!(
                    "compacting generation {}: {}",
                    record.generation, e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(generation: u64, name: &str) -> CommitRecord {
        CommitRecord {
            generation,
            ops: vec![WriteOp::Add {
                doc: DocId(generation as u32),
                key: Some(format!("k{generation}")),
                fields: FieldValues::new(name, "Mains"),
            }],
        }
    }

    #[test]
    fn test_append_and_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commits.log");

        {
            let mut log = CommitLog::open(path.clone()).unwrap();
            log.append(&record(1, "Pizza")).unwrap();
            log.append(&record(2, "Pad Thai")).unwrap();
        }

        let mut log = CommitLog::open(path).unwrap();
        let records = log.replay().unwrap();
        assert_eq!(records, vec![record(1, "Pizza"), record(2, "Pad Thai")]);
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commits.log");

        let good_len = {
            let mut log = CommitLog::open(path.clone()).unwrap();
            log.append(&record(1, "Pizza")).unwrap();
            let len = log.len().unwrap();
            log.append(&record(2, "Pad Thai")).unwrap();
            len
        };

        // chop the last record in half
        let full = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(good_len + (full - good_len) / 2).unwrap();
        drop(file);

        let mut log = CommitLog::open(path.clone()).unwrap();
        let records = log.replay().unwrap();
        assert_eq!(records, vec![record(1, "Pizza")]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good_len);

        // appending after recovery yields a clean log
        log.append(&record(2, "Green Curry")).unwrap();
        let records = log.replay().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_corrupt_tail_checksum_is_discarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commits.log");

        {
            let mut log = CommitLog::open(path.clone()).unwrap();
            log.append(&record(1, "Pizza")).unwrap();
            log.append(&record(2, "Ramen")).unwrap();
        }

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let mut log = CommitLog::open(path).unwrap();
        assert_eq!(log.replay().unwrap(), vec![record(1, "Pizza")]);
    }

    #[test]
    fn test_corrupt_middle_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commits.log");

        {
            let mut log = CommitLog::open(path.clone()).unwrap();
            log.append(&record(1, "Pizza")).unwrap();
            log.append(&record(2, "Ramen")).unwrap();
        }

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_LEN] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let mut log = CommitLog::open(path).unwrap();
        let err = log.replay().unwrap_err();
        assert!(matches!(err, DishdexError::Corrupt { offset: 0, .. }));
    }

    #[test]
    fn test_compact_replaces_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commits.log");

        let mut log = CommitLog::open(path.clone()).unwrap();
        for generation in 1..=20 {
            log.append(&record(generation, "Pizza")).unwrap();
        }
        let grown = log.len().unwrap();

        let compacted = CommitRecord {
            generation: 20,
            ops: vec![
                WriteOp::Add {
                    doc: DocId(19),
                    key: Some("k20".to_string()),
                    fields: FieldValues::new("Pizza", "Mains"),
                },
                WriteOp::Advance { next_doc: DocId(21) },
            ],
        };
        log.compact(&compacted).unwrap();
        assert!(log.len().unwrap() < grown);
        assert!(!dir.path().join("commits.log.compact").exists());

        // the reopened handle keeps appending to the compacted file
        log.append(&record(21, "Ramen")).unwrap();
        drop(log);

        let mut log = CommitLog::open(path).unwrap();
        assert_eq!(log.replay().unwrap(), vec![compacted, record(21, "Ramen")]);
    }

    #[test]
    fn test_read_records_leaves_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commits.log");
        assert!(CommitLog::read_records(&path).unwrap().is_empty());

        {
            let mut log = CommitLog::open(path.clone()).unwrap();
            log.append(&record(1, "Pizza")).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[7, 0, 0]);
        std::fs::write(&path, &bytes).unwrap();

        assert_eq!(CommitLog::read_records(&path).unwrap(), vec![record(1, "Pizza")]);
        assert_eq!(std::fs::read(&path).unwrap().len(), bytes.len());
    }
}
