//! File-backed store: one JSON object per file
//!
//! Every mutation rewrites the whole file through a temporary file in the
//! same directory followed by an atomic rename, so readers never observe a
//! half-written store. Each operation holds an advisory lock on a sidecar
//! `<file>.lock`, so separate processes sharing one state file see every
//! compare-and-swap as atomic.

use fd_lock::RwLock;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{KeyValueStore, StoreError, StoreResult};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    /// Open (lazily) the store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file carrying the cross-process lock
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn open_lock_file(&self) -> StoreResult<File> {
        fs::create_dir_all(self.parent_dir())?;
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?)
    }

    /// Run `f` while holding the process mutex and the shared file lock
    fn shared<R>(&self, f: impl FnOnce() -> StoreResult<R>) -> StoreResult<R> {
        let _guard = self.guard.lock();
        let lock = RwLock::new(self.open_lock_file()?);
        let _held = lock.read()?;
        f()
    }

    /// Run `f` while holding the process mutex and the exclusive file lock
    fn exclusive<R>(&self, f: impl FnOnce() -> StoreResult<R>) -> StoreResult<R> {
        let _guard = self.guard.lock();
        let mut lock = RwLock::new(self.open_lock_file()?);
        let _held = lock.write()?;
        f()
    }

    fn read_all(&self) -> StoreResult<Map<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Corrupt {
                path: self.path.clone(),
            }),
        }
    }

    fn write_all(&self, entries: &Map<String, Value>) -> StoreResult<()> {
        let parent = self.parent_dir();
        let mut temp_file = NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(&mut temp_file, entries)?;
        temp_file.write_all(b"\n")?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.shared(|| Ok(self.read_all()?.get(key).cloned()))
    }

    fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        self.exclusive(|| {
            let mut entries = self.read_all()?;
            entries.insert(key.to_string(), value);
            self.write_all(&entries)
        })
    }

    fn remove(&self, key: &str) -> StoreResult<Option<Value>> {
        self.exclusive(|| {
            let mut entries = self.read_all()?;
            let removed = entries.remove(key);
            if removed.is_some() {
                self.write_all(&entries)?;
            }
            Ok(removed)
        })
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Value>,
        replacement: Option<Value>,
    ) -> StoreResult<bool> {
        self.exclusive(|| {
            let mut entries = self.read_all()?;

            if entries.get(key) != expected {
                return Ok(false);
            }

            match replacement {
                Some(value) => {
                    entries.insert(key.to_string(), value);
                }
                None => {
                    entries.remove(key);
                }
            }
            self.write_all(&entries)?;
            Ok(true)
        })
    }
}
