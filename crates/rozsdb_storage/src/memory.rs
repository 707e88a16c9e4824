//! In-memory blob store for testing.

use crate::backend::BlobStore;
use crate::error::{validate_key, StorageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STORE: AtomicU64 = AtomicU64::new(1);

/// An in-memory blob store.
///
/// Suitable for unit tests and ephemeral collections. Every instance has a
/// distinct location.
///
/// # Example
///
/// ```rust
/// use rozsdb_storage::{BlobStore, InMemoryBackend};
///
/// let store = InMemoryBackend::new();
/// store.write("doc", b"test data").unwrap();
/// assert_eq!(store.read("doc").unwrap(), Some(b"test data".to_vec()));
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    location: String,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        let n = NEXT_STORE.fetch_add(1, Ordering::Relaxed);
        Self {
            location: format!("memory:{n}"),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns true if no blobs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBackend {
    fn location(&self) -> &str {
        &self.location
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }

    fn read_capped(&self, key: &str, max_len: u64) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self
            .blobs
            .read()
            .get(key)
            .filter(|data| data.len() as u64 <= max_len)
            .cloned())
    }

    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.blobs.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.blobs.write().remove(key).is_some())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.blobs.read().keys().cloned().collect())
    }
}
