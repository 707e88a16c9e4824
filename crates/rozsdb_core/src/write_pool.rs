//! Write-behind persistence queue.
//!
//! Mutations update the in-memory cache immediately and enqueue the new
//! compressed frame here. A background flusher drains the queue every
//! flush interval, writing at most one batch per cycle on the rayon pool.
//!
//! ## Coalescing
//!
//! The latest frame for each `(store, id)` pair lives in a pending map with
//! a sequence number. Queue entries only carry the sequence; an entry whose
//! sequence has been superseded by a newer enqueue is skipped, so the disk
//! only ever sees the last write. [`WritePool::discard`] drops the pending
//! frame so a queued write can never resurrect a deleted document.
//!
//! No map guard is held during disk I/O. A write in progress is recorded
//! in the in-flight map instead; if a discard clears that record before the
//! write returns, the flusher deletes the file it just wrote.

use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use rozsdb_storage::BlobStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::id::ObjectId;

type PendingKey = (String, ObjectId);

struct PendingWrite {
    seq: u64,
    frame: Vec<u8>,
}

struct WriteTask {
    store: Arc<dyn BlobStore>,
    id: ObjectId,
    seq: u64,
}

impl WriteTask {
    fn key(&self) -> PendingKey {
        (self.store.location().to_string(), self.id.clone())
    }
}

struct PoolInner {
    tx: Sender<WriteTask>,
    rx: Receiver<WriteTask>,
    pending: DashMap<PendingKey, PendingWrite>,
    in_flight: DashMap<PendingKey, Vec<u64>>,
    next_seq: AtomicU64,
    batch_size: usize,
    written: AtomicU64,
    failed: AtomicU64,
}

impl PoolInner {
    /// Pops up to `limit` queued tasks and writes them in parallel.
    fn flush_batch(&self, limit: usize) -> usize {
        let tasks: Vec<WriteTask> = self.rx.try_iter().take(limit).collect();
        if tasks.is_empty() {
            return 0;
        }
        let written = tasks.par_iter().filter(|task| self.write_task(task)).count();
        tracing::debug!(queued = tasks.len(), written, "write-behind flush");
        written
    }

    fn write_task(&self, task: &WriteTask) -> bool {
        let key = task.key();
        let frame = {
            let Some(pending) = self.pending.get(&key) else {
                return false;
            };
            if pending.seq != task.seq {
                return false;
            }
            // Marked while the pending guard is held, so a discard either
            // happens before this check or sees the mark.
            self.in_flight.entry(key.clone()).or_default().push(task.seq);
            pending.frame.clone()
        };

        let result = task.store.write(task.id.as_str(), &frame);
        let discarded = !self.finish_in_flight(&key, task.seq);

        match result {
            Ok(()) if discarded => {
                if let Err(e) = task.store.delete(task.id.as_str()) {
                    tracing::error!(
                        store = task.store.location(),
                        id = %task.id,
                        error = %e,
                        "failed to remove discarded write"
                    );
                }
                false
            }
            Ok(()) => {
                self.pending.remove_if(&key, |_, p| p.seq == task.seq);
                self.written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.pending.remove_if(&key, |_, p| p.seq == task.seq);
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    store = task.store.location(),
                    id = %task.id,
                    error = %e,
                    "write-behind flush failed"
                );
                false
            }
        }
    }

    /// Clears the in-flight mark for `seq`. Returns false if a discard
    /// already cleared it.
    fn finish_in_flight(&self, key: &PendingKey, seq: u64) -> bool {
        let found = match self.in_flight.get_mut(key) {
            Some(mut seqs) => match seqs.iter().position(|s| *s == seq) {
                Some(pos) => {
                    seqs.swap_remove(pos);
                    true
                }
                None => false,
            },
            None => false,
        };
        self.in_flight.remove_if(key, |_, seqs| seqs.is_empty());
        found
    }
}

/// Background write-behind queue shared by every collection of an engine.
pub struct WritePool {
    inner: Arc<PoolInner>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl WritePool {
    /// Creates a pool and starts its flusher thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the flusher thread cannot be spawned.
    pub fn start(flush_interval: Duration, batch_size: usize) -> std::io::Result<Self> {
        let pool = Self::manual(batch_size);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let inner = Arc::clone(&pool.inner);

        let handle = thread::Builder::new()
            .name("rozsdb-write-pool".into())
            .spawn(move || loop {
                crossbeam_channel::select! {
                    recv(shutdown_rx) -> _ => break,
                    default(flush_interval) => {
                        inner.flush_batch(inner.batch_size);
                    }
                }
            })?;

        *pool.shutdown_tx.lock() = Some(shutdown_tx);
        *pool.flusher.lock() = Some(handle);
        Ok(pool)
    }

    /// Creates a pool without a flusher thread.
    ///
    /// Writes stay queued until [`flush_once`](Self::flush_once) or
    /// [`force_flush`](Self::force_flush) is called.
    pub fn manual(batch_size: usize) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            inner: Arc::new(PoolInner {
                tx,
                rx,
                pending: DashMap::new(),
                in_flight: DashMap::new(),
                next_seq: AtomicU64::new(0),
                batch_size: batch_size.max(1),
                written: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            shutdown_tx: Mutex::new(None),
            flusher: Mutex::new(None),
        }
    }

    /// Queues `frame` to be written under `id` in `store`.
    ///
    /// Never blocks. A newer enqueue for the same id supersedes this one.
    pub fn enqueue(&self, store: &Arc<dyn BlobStore>, id: &ObjectId, frame: Vec<u8>) {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let key = (store.location().to_string(), id.clone());
        self.inner.pending.insert(key, PendingWrite { seq, frame });

        let task = WriteTask {
            store: Arc::clone(store),
            id: id.clone(),
            seq,
        };
        // The pool owns a receiver, so the channel cannot be disconnected.
        let _ = self.inner.tx.send(task);
    }

    /// Returns the latest unflushed frame for `id`.
    pub fn pending(&self, store: &dyn BlobStore, id: &ObjectId) -> Option<Vec<u8>> {
        let key = (store.location().to_string(), id.clone());
        self.inner.pending.get(&key).map(|p| p.frame.clone())
    }

    /// Returns every unflushed frame queued for `store`.
    pub fn pending_for(&self, store: &dyn BlobStore) -> Vec<(ObjectId, Vec<u8>)> {
        let location = store.location();
        self.inner
            .pending
            .iter()
            .filter(|e| e.key().0 == location)
            .map(|e| (e.key().1.clone(), e.value().frame.clone()))
            .collect()
    }

    /// Drops any unflushed frame for `id`.
    ///
    /// Returns true if something was pending. Never waits on disk I/O: a
    /// flush of that frame already in progress removes its file once the
    /// write returns.
    pub fn discard(&self, store: &dyn BlobStore, id: &ObjectId) -> bool {
        let key = (store.location().to_string(), id.clone());
        let pending = self.inner.pending.remove(&key).is_some();
        self.inner.in_flight.remove(&key);
        pending
    }

    /// Writes one batch now. Returns the number of documents written.
    pub fn flush_once(&self) -> usize {
        self.inner.flush_batch(self.inner.batch_size)
    }

    /// Writes everything queued so far. Returns the number written.
    pub fn force_flush(&self) -> usize {
        let mut total = 0;
        while !self.inner.rx.is_empty() {
            total += self.inner.flush_batch(usize::MAX);
        }
        total
    }

    /// Number of documents with an unflushed frame.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of queue entries, including superseded ones.
    pub fn queued_len(&self) -> usize {
        self.inner.rx.len()
    }

    /// Total documents written by flushes.
    pub fn written(&self) -> u64 {
        self.inner.written.load(Ordering::Relaxed)
    }

    /// Total flush writes that failed.
    pub fn failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// Stops the flusher thread and writes everything still queued.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) -> usize {
        drop(self.shutdown_tx.lock().take());
        if let Some(handle) = self.flusher.lock().take() {
            if handle.join().is_err() {
                tracing::error!("write pool flusher panicked");
            }
        }
        let flushed = self.force_flush();
        tracing::info!(flushed, "write pool stopped");
        flushed
    }
}

impl std::fmt::Debug for WritePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePool")
            .field("pending", &self.pending_len())
            .field("queued", &self.queued_len())
            .field("batch_size", &self.inner.batch_size)
            .finish()
    }
}

impl Drop for WritePool {
    fn drop(&mut self) {
        drop(self.shutdown_tx.lock().take());
        if let Some(handle) = self.flusher.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rozsdb_codec::{compress, decompress};
    use rozsdb_storage::InMemoryBackend;

    fn store() -> Arc<dyn BlobStore> {
        Arc::new(InMemoryBackend::new())
    }

    /// Store whose writes block until the test releases them.
    #[derive(Debug)]
    struct GatedStore {
        inner: InMemoryBackend,
        started: crossbeam_channel::Sender<()>,
        release: crossbeam_channel::Receiver<()>,
    }

    impl BlobStore for GatedStore {
        fn location(&self) -> &str {
            self.inner.location()
        }

        fn read(&self, key: &str) -> rozsdb_storage::StorageResult<Option<Vec<u8>>> {
            self.inner.read(key)
        }

        fn read_capped(
            &self,
            key: &str,
            max_len: u64,
        ) -> rozsdb_storage::StorageResult<Option<Vec<u8>>> {
            self.inner.read_capped(key, max_len)
        }

        fn write(&self, key: &str, data: &[u8]) -> rozsdb_storage::StorageResult<()> {
            let _ = self.started.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(10));
            self.inner.write(key, data)
        }

        fn delete(&self, key: &str) -> rozsdb_storage::StorageResult<bool> {
            self.inner.delete(key)
        }

        fn keys(&self) -> rozsdb_storage::StorageResult<Vec<String>> {
            self.inner.keys()
        }
    }

    fn gated_store() -> (
        Arc<dyn BlobStore>,
        crossbeam_channel::Receiver<()>,
        crossbeam_channel::Sender<()>,
    ) {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let store: Arc<dyn BlobStore> = Arc::new(GatedStore {
            inner: InMemoryBackend::new(),
            started: started_tx,
            release: release_rx,
        });
        (store, started_rx, release_tx)
    }

    #[test]
    fn enqueue_then_force_flush() {
        let pool = WritePool::manual(100);
        let store = store();
        let id = ObjectId::new();
        let frame = compress(br#"{"a":1}"#).unwrap();

        pool.enqueue(&store, &id, frame.clone());
        assert!(store.read(id.as_str()).unwrap().is_none());
        assert_eq!(pool.pending(store.as_ref(), &id), Some(frame.clone()));

        assert_eq!(pool.force_flush(), 1);
        let on_disk = store.read(id.as_str()).unwrap().unwrap();
        assert_eq!(decompress(&on_disk).unwrap(), br#"{"a":1}"#);
        assert_eq!(pool.pending_len(), 0);
    }

    #[test]
    fn last_write_wins() {
        let pool = WritePool::manual(100);
        let store = store();
        let id = ObjectId::new();

        pool.enqueue(&store, &id, vec![1]);
        pool.enqueue(&store, &id, vec![2]);
        pool.enqueue(&store, &id, vec![3]);
        assert_eq!(pool.queued_len(), 3);
        assert_eq!(pool.pending_len(), 1);

        assert_eq!(pool.force_flush(), 1);
        assert_eq!(store.read(id.as_str()).unwrap(), Some(vec![3]));
        assert_eq!(pool.written(), 1);
    }

    #[test]
    fn discard_prevents_write() {
        let pool = WritePool::manual(100);
        let store = store();
        let id = ObjectId::new();

        pool.enqueue(&store, &id, vec![1]);
        assert!(pool.discard(store.as_ref(), &id));
        assert!(!pool.discard(store.as_ref(), &id));

        assert_eq!(pool.force_flush(), 0);
        assert!(store.read(id.as_str()).unwrap().is_none());
    }

    #[test]
    fn enqueue_does_not_wait_for_disk_write() {
        let pool = Arc::new(WritePool::manual(100));
        let (store, started, release) = gated_store();
        let id = ObjectId::new();
        pool.enqueue(&store, &id, vec![1]);

        let flusher = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.force_flush())
        };
        started.recv_timeout(Duration::from_secs(5)).unwrap();

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        {
            let pool = Arc::clone(&pool);
            let store = Arc::clone(&store);
            let id = id.clone();
            thread::spawn(move || {
                pool.enqueue(&store, &id, vec![2]);
                let _ = done_tx.send(());
            });
        }
        assert!(
            done_rx.recv_timeout(Duration::from_secs(2)).is_ok(),
            "enqueue blocked behind an in-progress write"
        );

        release.send(()).unwrap();
        release.send(()).unwrap();
        flusher.join().unwrap();
        pool.force_flush();
        assert_eq!(store.read(id.as_str()).unwrap(), Some(vec![2]));
    }

    #[test]
    fn discard_during_write_removes_file() {
        let pool = Arc::new(WritePool::manual(100));
        let (store, started, release) = gated_store();
        let id = ObjectId::new();
        pool.enqueue(&store, &id, vec![1]);

        let flusher = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.force_flush())
        };
        started.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(pool.discard(store.as_ref(), &id));
        store.delete(id.as_str()).unwrap();
        release.send(()).unwrap();

        assert_eq!(flusher.join().unwrap(), 0);
        assert!(store.read(id.as_str()).unwrap().is_none());
        assert_eq!(pool.pending_len(), 0);
    }

    #[test]
    fn flush_once_respects_batch_size() {
        let pool = WritePool::manual(2);
        let store = store();
        for _ in 0..5 {
            pool.enqueue(&store, &ObjectId::new(), vec![0]);
        }

        assert_eq!(pool.flush_once(), 2);
        assert_eq!(pool.pending_len(), 3);
        assert_eq!(pool.force_flush(), 3);
    }

    #[test]
    fn pending_is_scoped_to_store() {
        let pool = WritePool::manual(10);
        let a = store();
        let b = store();
        let id = ObjectId::new();

        pool.enqueue(&a, &id, vec![1]);
        assert!(pool.pending(b.as_ref(), &id).is_none());
        assert_eq!(pool.pending_for(a.as_ref()).len(), 1);
        assert!(pool.pending_for(b.as_ref()).is_empty());
    }

    #[test]
    fn background_flusher_writes() {
        let pool = WritePool::start(Duration::from_millis(10), 100).unwrap();
        let store = store();
        let id = ObjectId::new();
        pool.enqueue(&store, &id, vec![7]);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while store.read(id.as_str()).unwrap().is_none() {
            assert!(std::time::Instant::now() < deadline, "flusher never ran");
            thread::sleep(Duration::from_millis(5));
        }
        pool.shutdown();
    }

    #[test]
    fn shutdown_flushes_remaining() {
        let pool = WritePool::start(Duration::from_secs(3600), 100).unwrap();
        let store = store();
        let id = ObjectId::new();
        pool.enqueue(&store, &id, vec![9]);

        assert_eq!(pool.shutdown(), 1);
        assert_eq!(store.read(id.as_str()).unwrap(), Some(vec![9]));
        assert_eq!(pool.shutdown(), 0);
    }
}
