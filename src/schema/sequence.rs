// The object-id sequence file: a small persisted counter in the system
// area, created at install, destroyed at uninstall, and brought back in
// line with the system tables during recovery.

use parking_lot::Mutex;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::ObjectId;
use crate::error::{DbError, Result};

const SEQUENCE_FILE: &str = "ObjectID";

pub struct ObjectIdSequence {
    path: PathBuf,
    state: Mutex<Option<u64>>,
}

impl ObjectIdSequence {
    pub fn new(system_area: &Path) -> ObjectIdSequence {
        ObjectIdSequence {
            path: system_area.join(SEQUENCE_FILE),
            state: Mutex::new(None),
        }
    }

    /// Create the file. Part of install; fails if it already exists.
    pub fn install(&self) -> Result<()> {
        if self.path.exists() {
            return Err(DbError::AlreadyExists(self.path.display().to_string()));
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&self.path)?;
        file.write_all(&0u64.to_le_bytes())?;
        file.sync_data()?;
        *self.state.lock() = Some(0);
        Ok(())
    }

    /// Remove the file. Part of uninstall.
    pub fn uninstall(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        *self.state.lock() = None;
        Ok(())
    }

    pub fn is_accessible(&self) -> bool {
        self.path.exists()
    }

    /// Take the next object id and persist the new high-water mark.
    pub fn next(&self) -> Result<ObjectId> {
        let mut state = self.state.lock();
        let current = match *state {
            Some(value) => value,
            None => self.load()?,
        };
        let next = current + 1;
        self.store(next)?;
        *state = Some(next);
        Ok(next)
    }

    /// The last assigned id.
    pub fn current(&self) -> Result<ObjectId> {
        let mut state = self.state.lock();
        match *state {
            Some(value) => Ok(value),
            None => {
                let value = self.load()?;
                *state = Some(value);
                Ok(value)
            }
        }
    }

    /// Recovery: never hand out an id at or below what the recovered
    /// system tables already use.
    pub fn recover(&self, highest_persisted: ObjectId) -> Result<()> {
        let mut state = self.state.lock();
        let on_disk = match *state {
            Some(value) => value,
            None => self.load()?,
        };
        let value = on_disk.max(highest_persisted);
        self.store(value)?;
        *state = Some(value);
        Ok(())
    }

    fn load(&self) -> Result<u64> {
        let mut file = fs::File::open(&self.path)?;
        let mut buffer = [0u8; 8];
        file.read_exact(&mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    fn store(&self, value: u64) -> Result<()> {
        let mut file = fs::OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&value.to_le_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn install_next_uninstall() {
        let dir = TempDir::new().unwrap();
        let sequence = ObjectIdSequence::new(dir.path());
        sequence.install().unwrap();
        assert!(sequence.is_accessible());
        assert_eq!(sequence.next().unwrap(), 1);
        assert_eq!(sequence.next().unwrap(), 2);
        assert!(sequence.install().is_err());
        sequence.uninstall().unwrap();
        assert!(!sequence.is_accessible());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let sequence = ObjectIdSequence::new(dir.path());
            sequence.install().unwrap();
            sequence.next().unwrap();
            sequence.next().unwrap();
        }
        let sequence = ObjectIdSequence::new(dir.path());
        assert_eq!(sequence.current().unwrap(), 2);
        assert_eq!(sequence.next().unwrap(), 3);
    }

    #[test]
    fn recover_respects_persisted_ids() {
        let dir = TempDir::new().unwrap();
        let sequence = ObjectIdSequence::new(dir.path());
        sequence.install().unwrap();
        sequence.next().unwrap();
        // The system tables hold ids up to 10; the counter must jump.
        sequence.recover(10).unwrap();
        assert_eq!(sequence.next().unwrap(), 11);
    }
}
