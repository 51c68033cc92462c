//! Durable record of the last launched server PID.
//!
//! The record is a single text file holding a decimal process id. Absence
//! means no server is tracked. Writes and conditional clears are serialized
//! so an exit watcher for an old child cannot erase a newer child's record.

use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PidStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl PidStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded PID.
    ///
    /// Returns `Ok(None)` when there is no record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPid`] if the file holds anything but a
    /// non-negative decimal number, or an IO error if it cannot be read.
    pub fn read(&self) -> Result<Option<u32>> {
        let _guard = self.lock.lock();
        self.read_unlocked()
    }

    /// Persist `pid`, creating the parent directory if needed.
    pub fn write(&self, pid: u32) -> Result<()> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }
        fs::write(&self.path, pid.to_string())
            .map_err(|e| Error::io(format!("writing {}", self.path.display()), e))?;
        debug!(pid, path = %self.path.display(), "Recorded server pid");
        Ok(())
    }

    /// Delete the record. Missing records are not an error.
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        self.remove_unlocked();
    }

    /// Delete the record only if it still names `pid`.
    ///
    /// Returns `true` if the record was removed.
    pub fn clear_if(&self, pid: u32) -> bool {
        let _guard = self.lock.lock();
        match self.read_unlocked() {
            Ok(Some(recorded)) if recorded == pid => {
                self.remove_unlocked();
                true
            },
            _ => false,
        }
    }

    fn read_unlocked(&self) -> Result<Option<u32>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(format!("reading {}", self.path.display()), e)),
        };
        let trimmed = text.trim();
        trimmed
            .parse::<u32>()
            .map(Some)
            .map_err(|_| Error::InvalidPid(trimmed.to_string()))
    }

    fn remove_unlocked(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Cleared pid record"),
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to clear pid record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> PidStore {
        PidStore::new(dir.path().join("var").join("nodpi.pid"))
    }

    #[test]
    fn test_missing_record_reads_none() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(store(&temp_dir).read().unwrap(), None);
    }

    #[test]
    fn test_write_read_clear() {
        let temp_dir = TempDir::new().unwrap();
        let pids = store(&temp_dir);

        pids.write(4242).unwrap();
        assert_eq!(pids.read().unwrap(), Some(4242));
        assert_eq!(fs::read_to_string(pids.path()).unwrap(), "4242");

        pids.clear();
        assert!(!pids.path().exists());
        // Clearing twice is fine
        pids.clear();
    }

    #[test]
    fn test_garbage_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let pids = store(&temp_dir);
        fs::create_dir_all(pids.path().parent().unwrap()).unwrap();

        fs::write(pids.path(), "not a pid").unwrap();
        assert!(matches!(pids.read(), Err(Error::InvalidPid(_))));

        fs::write(pids.path(), "-5").unwrap();
        assert!(matches!(pids.read(), Err(Error::InvalidPid(_))));

        fs::write(pids.path(), " 77\n").unwrap();
        assert_eq!(pids.read().unwrap(), Some(77));
    }

    #[test]
    fn test_clear_if_only_matching_pid() {
        let temp_dir = TempDir::new().unwrap();
        let pids = store(&temp_dir);

        pids.write(100).unwrap();
        assert!(!pids.clear_if(99));
        assert_eq!(pids.read().unwrap(), Some(100));
        assert!(pids.clear_if(100));
        assert_eq!(pids.read().unwrap(), None);
    }
}
