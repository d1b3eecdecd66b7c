use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::DishdexError;
use crate::Result;

/// Exclusive writer lock on a storage location.
///
/// The lock token is a file created with `create_new`, so at most one
/// holder can exist. It contains the holder's process id and is removed
/// when the lock is dropped. A process that crashes leaves the token
/// behind; [`WriterLock::force_unlock`] clears it.
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    /// Take the lock, failing fast with `WriteConflict` if it is held
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        Self::acquire_with(path.into(), |file| {
            writeln!(file, "{}", std::process::id())?;
            file.sync_all()
        })
    }

    fn acquire_with(path: PathBuf, write_token: impl FnOnce(&mut File) -> std::io::Result<()>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let location = path.parent().unwrap_or(&path);
                return Err(DishdexError::WriteConflict(location.display().to_string()));
            }
            Err(e) => return Err(DishdexError::Io(e)),
        };

        if let Err(e) = write_token(&mut file) {
            drop(file);
            // a half-written token would block every later writer
            if let Err(remove_err) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %remove_err, "failed to remove writer lock token");
            }
            return Err(DishdexError::Io(e));
        }

        debug!(path = %path.display(), "acquired writer lock");
        Ok(Self { path })
    }

    /// Remove a stale lock token. Returns whether one existed.
    pub fn force_unlock(path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => {
                warn!(path = %path.display(), "removed writer lock");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DishdexError::Io(e)),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released writer lock"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to release writer lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_conflicts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("write.lock");

        let lock = WriterLock::acquire(&path).unwrap();
        let err = WriterLock::acquire(&path).unwrap_err();
        assert!(matches!(err, DishdexError::WriteConflict(_)));

        drop(lock);
        assert!(!path.exists());
        let _again = WriterLock::acquire(&path).unwrap();
    }

    #[test]
    fn test_lock_records_pid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("write.lock");
        let _lock = WriterLock::acquire(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_failed_token_write_releases_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("write.lock");

        let err = WriterLock::acquire_with(path.clone(), |_| {
            Err(std::io::Error::new(ErrorKind::Other, "no space left"))
        })
        .unwrap_err();
        assert!(matches!(err, DishdexError::Io(_)));
        assert!(!path.exists());

        let _lock = WriterLock::acquire(&path).unwrap();
    }

    #[test]
    fn test_force_unlock_stale_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("write.lock");
        std::fs::write(&path, "12345\n").unwrap();

        assert!(WriterLock::acquire(&path).is_err());
        assert!(WriterLock::force_unlock(&path).unwrap());
        assert!(!WriterLock::force_unlock(&path).unwrap());
        let _lock = WriterLock::acquire(&path).unwrap();
    }
}
