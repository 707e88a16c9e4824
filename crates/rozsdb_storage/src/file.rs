//! File-based blob store: one file per key inside a directory.

use crate::backend::BlobStore;
use crate::error::{validate_key, StorageError, StorageResult};
use parking_lot::{Condvar, Mutex};
use rayon::prelude::*;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Files at or above this size are read under the large-read gate.
pub const LARGE_FILE_THRESHOLD: u64 = 1024 * 1024;

/// Suffix of the temporary files used for atomic writes.
const TEMP_SUFFIX: &str = ".tmp";

/// Counting gate bounding how many large files are read at once.
///
/// Reading many large documents concurrently would otherwise hold all of
/// them in memory at the same time.
#[derive(Debug)]
pub struct LargeReadGate {
    available: Mutex<usize>,
    released: Condvar,
}

impl LargeReadGate {
    /// Creates a gate with `permits` concurrent slots (at least one).
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            available: Mutex::new(permits.max(1)),
            released: Condvar::new(),
        }
    }

    /// Creates a gate sized to half the available parallelism.
    #[must_use]
    pub fn for_host() -> Self {
        let cpus = std::thread::available_parallelism().map_or(1, usize::from);
        Self::new(cpus / 2)
    }

    /// Blocks until a slot is free and returns a guard holding it.
    pub fn acquire(&self) -> LargeReadPermit<'_> {
        let mut available = self.available.lock();
        while *available == 0 {
            self.released.wait(&mut available);
        }
        *available -= 1;
        LargeReadPermit { gate: self }
    }

    /// Number of currently free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        *self.available.lock()
    }
}

/// Slot held on a [`LargeReadGate`]; released on drop.
#[derive(Debug)]
pub struct LargeReadPermit<'a> {
    gate: &'a LargeReadGate,
}

impl Drop for LargeReadPermit<'_> {
    fn drop(&mut self) {
        *self.gate.available.lock() += 1;
        self.gate.released.notify_one();
    }
}

/// A directory-backed blob store.
///
/// Each key maps to a file of the same name. Writes go to a temporary
/// file that is synced and renamed over the target, so a crash never
/// leaves a half-written document behind.
///
/// # Example
///
/// ```no_run
/// use rozsdb_storage::{BlobStore, FileBackend};
/// use std::path::Path;
///
/// let store = FileBackend::open(Path::new("database/users")).unwrap();
/// store.write("AbC123xyz000", b"frame bytes").unwrap();
/// assert!(store.read("AbC123xyz000").unwrap().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    location: String,
    gate: Arc<LargeReadGate>,
}

impl FileBackend {
    /// Opens the directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the path
    /// exists but is not a directory.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        Self::open_with_gate(dir, Arc::new(LargeReadGate::for_host()))
    }

    /// Opens the directory sharing an existing large-read gate.
    pub fn open_with_gate(dir: &Path, gate: Arc<LargeReadGate>) -> StorageResult<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        if !dir.is_dir() {
            return Err(StorageError::NotADirectory(dir.display().to_string()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            location: dir.display().to_string(),
            gate,
        })
    }

    /// Returns the directory holding the blobs.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    fn read_file(&self, path: &Path, len: u64) -> StorageResult<Vec<u8>> {
        if len >= LARGE_FILE_THRESHOLD {
            let _permit = self.gate.acquire();
            return Ok(fs::read(path)?);
        }
        Ok(fs::read(path)?)
    }
}

impl BlobStore for FileBackend {
    fn location(&self) -> &str {
        &self.location
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.read_capped(key, u64::MAX)
    }

    fn read_capped(&self, key: &str, max_len: u64) -> StorageResult<Option<Vec<u8>>> {
        let path = self.blob_path(key)?;
        let len = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if len > max_len {
            warn!(path = %path.display(), len, max_len, "skipping oversized blob");
            return Ok(None);
        }
        match self.read_file(&path, len) {
            Ok(data) => Ok(Some(data)),
            Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.blob_path(key)?;
        // Each write gets its own temp file so concurrent writers of the
        // same key never rename each other's data away.
        let mut temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;

        temp.persist(&path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            keys.push(name);
        }
        Ok(keys)
    }

    fn read_all(&self, max_len: u64, exclude: &[&str]) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let keys: Vec<String> = self
            .keys()?
            .into_iter()
            .filter(|k| !exclude.contains(&k.as_str()))
            .collect();

        let blobs: Vec<(String, Vec<u8>)> = keys
            .into_par_iter()
            .filter_map(|key| match self.read_capped(&key, max_len) {
                Ok(Some(data)) => Some((key, data)),
                Ok(None) => None,
                Err(e) => {
                    warn!(dir = %self.dir.display(), key = %key, error = %e, "failed to read blob");
                    None
                }
            })
            .collect();
        Ok(blobs)
    }
}
