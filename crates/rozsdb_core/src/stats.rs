//! Collection statistics.
//!
//! Counters are kept per collection instance and reset when the collection
//! is evicted and hydrated again.
//!
//! # Usage
//!
//! ```rust,ignore
//! let users = engine.collection("app", "users")?;
//! users.find("name", &"alice".into())?;
//!
//! let stats = users.stats().snapshot();
//! println!("finds: {}, decompressions: {}", stats.finds, stats.decompressions);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-collection operation counters.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct CollectionStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    finds: AtomicU64,
    /// Frames decompressed while evaluating predicates.
    decompressions: AtomicU64,
    bytes_written: AtomicU64,
    disk_reads: AtomicU64,
    hydrated: AtomicU64,
}

impl CollectionStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_find(&self) {
        self.finds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decompression(&self) {
        self.decompressions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disk_read(&self) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_hydrated(&self, count: u64) {
        self.hydrated.store(count, Ordering::Relaxed);
    }

    /// Returns the number of single-document lookups.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of inserts and updates.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of successful deletes.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Returns the number of predicate queries.
    pub fn finds(&self) -> u64 {
        self.finds.load(Ordering::Relaxed)
    }

    /// Returns the number of frames decompressed by predicate queries.
    ///
    /// Documents filtered out by the field index are never decompressed, so
    /// this stays at or below the number of candidates.
    pub fn decompressions(&self) -> u64 {
        self.decompressions.load(Ordering::Relaxed)
    }

    /// Returns the total compressed bytes written.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of cache misses served from disk.
    pub fn disk_reads(&self) -> u64 {
        self.disk_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of documents loaded during hydration.
    pub fn hydrated(&self) -> u64 {
        self.hydrated.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            finds: self.finds(),
            decompressions: self.decompressions(),
            bytes_written: self.bytes_written(),
            disk_reads: self.disk_reads(),
            hydrated: self.hydrated(),
        }
    }
}

/// A point-in-time copy of [`CollectionStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Single-document lookups.
    pub reads: u64,
    /// Inserts and updates.
    pub writes: u64,
    /// Successful deletes.
    pub deletes: u64,
    /// Predicate queries.
    pub finds: u64,
    /// Frames decompressed by predicate queries.
    pub decompressions: u64,
    /// Compressed bytes written.
    pub bytes_written: u64,
    /// Cache misses served from disk.
    pub disk_reads: u64,
    /// Documents loaded during hydration.
    pub hydrated: u64,
}
