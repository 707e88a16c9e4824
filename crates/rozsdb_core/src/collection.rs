//! Collections of compressed documents.
//!
//! A [`Collection`] is a cache over one directory of document files. It is
//! hydrated from disk when first accessed, serves reads from memory, and
//! persists writes through the engine's [`WritePool`](crate::WritePool).
//! After the configured idle window without a successful operation, the
//! engine evicts it: the cache is flushed to disk, cleared, and the
//! collection is removed from its database. Handles held past eviction
//! report [`CoreError::CollectionTimedOut`]; asking the database again
//! returns a freshly hydrated instance.
//!
//! # Example
//!
//! ```rust,ignore
//! let users = engine.collection("app", "users")?;
//! let frame = users.insert_or_update(None, r#"{"name":"alice"}"#)?;
//! let hits = users.find("name", &"alice".into())?;
//! assert_eq!(hits, vec![frame]);
//! ```

use crate::cache::DocumentCache;
use crate::database::Database;
use crate::engine::Services;
use crate::error::{CoreError, CoreResult};
use crate::id::ObjectId;
use crate::meta::{DataMeta, MetaIndex, META_FILE};
use crate::stats::CollectionStats;
use crate::timeout::TimeoutHandle;
use rayon::prelude::*;
use rozsdb_codec::{values_match, Document, DocumentBuilder, Value};
use rozsdb_storage::BlobStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A named set of documents inside a database.
pub struct Collection {
    name: String,
    store: Arc<dyn BlobStore>,
    cache: Box<dyn DocumentCache>,
    meta: Arc<MetaIndex>,
    services: Arc<Services>,
    database: Weak<Database>,
    timer: TimeoutHandle,
    timed_out: AtomicBool,
    stats: CollectionStats,
}

impl Collection {
    /// Hydrates a collection from `store` and arms its idle timer.
    pub(crate) fn open(
        name: &str,
        store: Arc<dyn BlobStore>,
        meta: Arc<MetaIndex>,
        services: Arc<Services>,
        database: Weak<Database>,
    ) -> CoreResult<Arc<Self>> {
        let cache = services.config.cache_strategy.build();
        let hydrated = hydrate(cache.as_ref(), store.as_ref(), &meta, &services)?;
        let window = services.config.idle_timeout;

        let collection = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let timer = services.timeouts.schedule(window, move || {
                if let Some(collection) = weak.upgrade() {
                    collection.evict();
                }
            });
            Self {
                name: name.to_string(),
                store,
                cache,
                meta,
                services: Arc::clone(&services),
                database,
                timer,
                timed_out: AtomicBool::new(false),
                stats: CollectionStats::new(),
            }
        });

        collection.stats.set_hydrated(hydrated as u64);
        tracing::info!(
            collection = %collection.name,
            location = collection.store.location(),
            documents = hydrated,
            "collection hydrated"
        );
        Ok(collection)
    }

    /// Inserts a new document or replaces an existing one.
    ///
    /// A fresh id is generated when `id` is `None`. The stored document is
    /// `json` with `$id` set to the id. Returns the compressed frame.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if `json` is not a JSON object.
    pub fn insert_or_update(&self, id: Option<ObjectId>, json: &str) -> CoreResult<Vec<u8>> {
        self.ensure_live()?;
        let id = id.unwrap_or_default();
        let document = DocumentBuilder::from_json(json)
            .map_err(CoreError::invalid_input)?
            .with_id(id.as_str())
            .build();
        let frame = document.to_frame()?;

        self.cache.insert(id.clone(), frame.clone());
        self.services
            .write_pool
            .enqueue(&self.store, &id, frame.clone());
        self.meta.upsert(&id, document.content_fields());

        self.stats.record_write(frame.len() as u64);
        tracing::debug!(collection = %self.name, %id, "document written");
        self.touch();
        Ok(frame)
    }

    /// Deletes a document. Returns false if it did not exist.
    ///
    /// The file is removed immediately; a queued write for the id is
    /// dropped first so it cannot bring the document back.
    pub fn delete(&self, id: &ObjectId) -> CoreResult<bool> {
        self.ensure_live()?;
        let cached = self.cache.remove(id).is_some();
        let pending = self.services.write_pool.discard(self.store.as_ref(), id);
        let indexed = self.meta.contains(id);

        if !(cached || pending || indexed) {
            self.touch();
            return Ok(false);
        }

        self.store.delete(id.as_str())?;
        self.meta.remove_record(id);
        self.stats.record_delete();
        tracing::debug!(collection = %self.name, %id, "document deleted");
        self.touch();
        Ok(true)
    }

    /// Returns the compressed frame of a document.
    pub fn find_by_id(&self, id: &ObjectId) -> CoreResult<Option<Vec<u8>>> {
        self.ensure_live()?;
        self.stats.record_read();
        let frame = self.load(id)?;
        self.touch();
        Ok(frame)
    }

    /// Returns every document whose top-level `field` matches `value`.
    ///
    /// Only documents whose metadata lists `field` are decompressed.
    /// Numbers compare within [`rozsdb_codec::FLOAT_EPSILON`]; a string
    /// `value` is coerced to the stored field's type.
    ///
    /// # Errors
    ///
    /// A candidate frame that fails to decompress or parse fails the whole
    /// query with [`CoreError::Codec`].
    pub fn find(&self, field: &str, value: &Value) -> CoreResult<Vec<Vec<u8>>> {
        self.ensure_live()?;
        self.stats.record_find();

        let candidates = self.meta.ids_with_field(field);
        let checked: Vec<Option<Vec<u8>>> = candidates
            .par_iter()
            .map(|id| -> CoreResult<Option<Vec<u8>>> {
                let Some(frame) = self.load(id)? else {
                    return Ok(None);
                };
                self.stats.record_decompression();
                let document = Document::from_frame(&frame)?;
                let matched = document
                    .get(field)
                    .is_some_and(|stored| values_match(stored, value));
                Ok(matched.then_some(frame))
            })
            .collect::<CoreResult<_>>()?;

        self.touch();
        Ok(checked.into_iter().flatten().collect())
    }

    /// Returns every document, ordered by id.
    pub fn find_all(&self) -> CoreResult<Vec<Vec<u8>>> {
        self.ensure_live()?;
        let mut frames = Vec::with_capacity(self.meta.len());
        for id in self.meta.ids() {
            if let Some(frame) = self.load(&id)? {
                frames.push(frame);
            }
        }
        self.touch();
        Ok(frames)
    }

    /// Writes every cached document whose file content differs.
    ///
    /// Returns the number of files written.
    pub fn save(&self) -> CoreResult<usize> {
        let entries = self.cache.snapshot();
        let results: Vec<CoreResult<bool>> = entries
            .par_iter()
            .map(|(id, frame)| {
                self.store
                    .write_if_changed(id.as_str(), frame)
                    .map_err(CoreError::from)
            })
            .collect();

        let mut written = 0;
        for result in results {
            if result? {
                written += 1;
            }
        }
        tracing::debug!(collection = %self.name, written, "collection saved");
        Ok(written)
    }

    /// Evicts the collection now instead of waiting for the idle timer.
    ///
    /// Closing an already evicted collection is a no-op.
    pub fn close(&self) -> CoreResult<()> {
        self.timer.cancel();
        if self.timed_out.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.release()
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the storage location, a directory path for file stores.
    pub fn location(&self) -> &str {
        self.store.location()
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.meta.len()
    }

    /// Returns true if the collection holds no documents.
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Number of documents currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Returns the metadata record of a document.
    pub fn meta(&self, id: &ObjectId) -> Option<DataMeta> {
        self.meta.record(id)
    }

    /// Returns operation counters.
    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// Returns true once the collection has been evicted.
    pub fn is_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.is_timed_out() {
            return Err(CoreError::timed_out(&self.name));
        }
        Ok(())
    }

    fn touch(&self) {
        self.timer.reset();
    }

    /// Cache, then write-behind queue, then disk.
    fn load(&self, id: &ObjectId) -> CoreResult<Option<Vec<u8>>> {
        if let Some(frame) = self.cache.get(id) {
            return Ok(Some(frame));
        }
        if !self.meta.contains(id) {
            return Ok(None);
        }
        if let Some(frame) = self.services.write_pool.pending(self.store.as_ref(), id) {
            self.cache.insert(id.clone(), frame.clone());
            return Ok(Some(frame));
        }
        let frame = self.store.read(id.as_str())?;
        if let Some(frame) = &frame {
            self.stats.record_disk_read();
            self.cache.insert(id.clone(), frame.clone());
        }
        Ok(frame)
    }

    /// Idle timer action.
    fn evict(&self) {
        if self.timed_out.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.release() {
            tracing::error!(collection = %self.name, error = %e, "failed to flush evicted collection");
        }
    }

    fn release(&self) -> CoreResult<()> {
        let saved = self.save();
        let meta_saved = self.meta.save();
        self.cache.clear();
        if let Some(database) = self.database.upgrade() {
            database.unregister(self);
        }
        tracing::info!(collection = %self.name, "collection evicted");
        saved?;
        meta_saved
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("location", &self.store.location())
            .field("documents", &self.len())
            .field("timed_out", &self.is_timed_out())
            .finish()
    }
}

/// Loads every document file into `cache`, then overlays writes still
/// queued for this store. Documents without a metadata record get one
/// rebuilt from their content.
fn hydrate(
    cache: &dyn DocumentCache,
    store: &dyn BlobStore,
    meta: &MetaIndex,
    services: &Services,
) -> CoreResult<usize> {
    let blobs = store.read_all(services.config.max_file_size_bytes(), &[META_FILE])?;
    let mut count = 0;

    for (key, frame) in blobs {
        let Ok(id) = ObjectId::parse(&key) else {
            tracing::warn!(location = store.location(), file = %key, "skipping unexpected file");
            continue;
        };
        if !meta.contains(&id) {
            rebuild_meta(meta, &id, &frame);
        }
        cache.insert(id, frame);
        count += 1;
    }

    for (id, frame) in services.write_pool.pending_for(store) {
        if !meta.contains(&id) {
            rebuild_meta(meta, &id, &frame);
        }
        cache.insert(id, frame);
    }
    Ok(count)
}

fn rebuild_meta(meta: &MetaIndex, id: &ObjectId, frame: &[u8]) {
    match Document::from_frame(frame) {
        Ok(document) => {
            tracing::debug!(%id, "rebuilding missing metadata record");
            meta.add_record(id.clone(), DataMeta::new(id, document.content_fields()));
        }
        Err(e) => {
            tracing::warn!(%id, error = %e, "unreadable document found during hydration");
        }
    }
}
