//! Blob store trait definition.

use crate::error::StorageResult;

/// A flat store of named byte blobs.
///
/// A blob store is **opaque**: it does not interpret the bytes it holds.
/// RozsDB uses one store per collection, with one blob per document plus a
/// reserved metadata blob.
///
/// # Invariants
///
/// - `write` fully replaces any previous blob under the same key
/// - `read` returns exactly the bytes last written under that key
/// - `delete` is immediate; a deleted key is absent from `keys`
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::FileBackend`] - one file per key in a directory
/// - [`super::InMemoryBackend`] - for testing
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Stable identity of the underlying location.
    ///
    /// Two stores with the same location refer to the same blobs.
    fn location(&self) -> &str;

    /// Reads the blob under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Reads the blob under `key` if it is at most `max_len` bytes.
    ///
    /// Oversized blobs are reported as `None`.
    fn read_capped(&self, key: &str, max_len: u64) -> StorageResult<Option<Vec<u8>>>;

    /// Writes `data` under `key`, replacing any existing blob.
    ///
    /// After this returns successfully the blob is durable.
    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Deletes the blob under `key`.
    ///
    /// Returns `false` if there was nothing to delete.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Lists all blob keys.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Writes `data` only if it differs from what is stored.
    ///
    /// Returns `true` if a write happened.
    fn write_if_changed(&self, key: &str, data: &[u8]) -> StorageResult<bool> {
        if self.read(key)?.as_deref() == Some(data) {
            return Ok(false);
        }
        self.write(key, data)?;
        Ok(true)
    }

    /// Reads every blob not named in `exclude`, skipping blobs larger
    /// than `max_len`.
    ///
    /// Blobs that fail to read are skipped, not reported.
    fn read_all(&self, max_len: u64, exclude: &[&str]) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        for key in self.keys()? {
            if exclude.contains(&key.as_str()) {
                continue;
            }
            if let Ok(Some(data)) = self.read_capped(&key, max_len) {
                out.push((key, data));
            }
        }
        Ok(out)
    }
}
