//! In-memory document caches.
//!
//! A collection keeps compressed document frames in a [`DocumentCache`].
//! Two strategies exist:
//!
//! - [`UnboundedCache`] keeps every hydrated document until the collection
//!   is evicted. Sharded, so readers and writers on different ids rarely
//!   contend.
//! - [`LruCache`] keeps a fixed number of recently used documents. Misses
//!   are served by the write-behind queue and then by disk.

use crate::config::CacheStrategy;
use crate::id::ObjectId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// A map from document id to compressed frame.
pub trait DocumentCache: Send + Sync + std::fmt::Debug {
    /// Returns a copy of the cached frame.
    fn get(&self, id: &ObjectId) -> Option<Vec<u8>>;

    /// Caches `frame`, replacing any previous entry.
    fn insert(&self, id: ObjectId, frame: Vec<u8>);

    /// Removes and returns the cached frame.
    fn remove(&self, id: &ObjectId) -> Option<Vec<u8>>;

    /// Returns true if `id` is cached.
    fn contains(&self, id: &ObjectId) -> bool;

    /// Number of cached documents.
    fn len(&self) -> usize;

    /// Returns true if nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    fn clear(&self);

    /// Copies out every entry.
    fn snapshot(&self) -> Vec<(ObjectId, Vec<u8>)>;

    /// Maximum number of entries, or `None` if unbounded.
    fn capacity(&self) -> Option<usize>;
}

impl CacheStrategy {
    /// Builds an empty cache for this strategy.
    ///
    /// An LRU capacity of zero is treated as one.
    pub fn build(&self) -> Box<dyn DocumentCache> {
        match *self {
            Self::Unbounded => Box::new(UnboundedCache::new()),
            Self::Lru { capacity } => Box::new(LruCache::new(capacity)),
        }
    }
}

/// Cache that never evicts on its own.
#[derive(Debug, Default)]
pub struct UnboundedCache {
    entries: DashMap<ObjectId, Vec<u8>>,
}

impl UnboundedCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentCache for UnboundedCache {
    fn get(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.entries.get(id).map(|frame| frame.clone())
    }

    fn insert(&self, id: ObjectId, frame: Vec<u8>) {
        self.entries.insert(id, frame);
    }

    fn remove(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.entries.remove(id).map(|(_, frame)| frame)
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains_key(id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn snapshot(&self) -> Vec<(ObjectId, Vec<u8>)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// Least-recently-used cache with a fixed capacity.
pub struct LruCache {
    inner: Mutex<lru::LruCache<ObjectId, Vec<u8>>>,
    capacity: NonZeroUsize,
}

impl LruCache {
    /// Creates an empty cache holding at most `capacity` documents.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(lru::LruCache::new(capacity)),
            capacity,
        }
    }
}

impl std::fmt::Debug for LruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl DocumentCache for LruCache {
    fn get(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.inner.lock().get(id).cloned()
    }

    fn insert(&self, id: ObjectId, frame: Vec<u8>) {
        self.inner.lock().put(id, frame);
    }

    fn remove(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.inner.lock().pop(id)
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.inner.lock().contains(id)
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }

    fn snapshot(&self) -> Vec<(ObjectId, Vec<u8>)> {
        self.inner
            .lock()
            .iter()
            .map(|(id, frame)| (id.clone(), frame.clone()))
            .collect()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity.get())
    }
}
