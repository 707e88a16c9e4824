//! Per-document metadata and the field-presence index.
//!
//! Every collection directory carries a reserved `meta.rozs` blob holding one
//! [`DataMeta`] record per live document. The record lists the document's
//! top-level fields so predicate queries can skip documents that cannot
//! match without decompressing them.
//!
//! ## File format
//!
//! ```text
//! zstd( {"records": [ {"id", "createdAt", "updatedAt", "fields"}, ... ]} )
//! ```
//!
//! Older files may store each record as a JSON-encoded string instead of an
//! inline object. Both forms are accepted on load; saves always write
//! objects.

use crate::error::CoreResult;
use crate::id::ObjectId;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rozsdb_codec::{compress, decompress};
use rozsdb_storage::BlobStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved blob name for the metadata file.
pub const META_FILE: &str = "meta.rozs";

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Metadata for one stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMeta {
    /// Document identifier.
    pub id: String,
    /// When the document was first inserted (RFC 3339, UTC).
    pub created_at: String,
    /// When the document was last written (RFC 3339, UTC).
    pub updated_at: String,
    /// Top-level field names, excluding `$id`.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl DataMeta {
    /// Creates a record stamped with the current time.
    pub fn new(id: &ObjectId, fields: Vec<String>) -> Self {
        let now = now_rfc3339();
        Self {
            id: id.to_string(),
            created_at: now.clone(),
            updated_at: now,
            fields,
        }
    }

    /// Returns true if the document has `field` at the top level.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    fn touch(&mut self, fields: Vec<String>) {
        self.fields = fields;
        self.updated_at = now_rfc3339();
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct MetaFile<T> {
    #[serde(default)]
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Inline(DataMeta),
    Encoded(String),
}

impl StoredRecord {
    fn into_meta(self) -> Option<DataMeta> {
        match self {
            Self::Inline(meta) => Some(meta),
            Self::Encoded(text) => match serde_json::from_str(&text) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable metadata record");
                    None
                }
            },
        }
    }
}

/// The metadata records of one collection, keyed by document id.
#[derive(Debug)]
pub struct MetaIndex {
    store: Arc<dyn BlobStore>,
    records: RwLock<HashMap<ObjectId, DataMeta>>,
}

impl MetaIndex {
    /// Creates an empty index over `store` without touching disk.
    pub fn empty(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Loads the index from the store's metadata blob.
    ///
    /// A missing blob is created with an empty record list.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be read, decompressed or parsed.
    pub fn load(store: Arc<dyn BlobStore>) -> CoreResult<Self> {
        let index = Self::empty(store);
        let Some(frame) = index.store.read(META_FILE)? else {
            index.save()?;
            return Ok(index);
        };

        let file: MetaFile<StoredRecord> = serde_json::from_slice(&decompress(&frame)?)?;
        {
            let mut records = index.records.write();
            for meta in file.records.into_iter().filter_map(StoredRecord::into_meta) {
                match ObjectId::parse(&meta.id) {
                    Ok(id) => {
                        records.insert(id, meta);
                    }
                    Err(_) => {
                        tracing::warn!(id = %meta.id, "skipping metadata record with invalid id");
                    }
                }
            }
        }
        Ok(index)
    }

    /// Writes every record back to the metadata blob.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> CoreResult<()> {
        let file = MetaFile {
            records: self.snapshot(),
        };
        let frame = compress(&serde_json::to_vec(&file)?)?;
        self.store.write(META_FILE, &frame)?;
        Ok(())
    }

    /// Inserts or replaces a record as-is.
    pub fn add_record(&self, id: ObjectId, meta: DataMeta) {
        self.records.write().insert(id, meta);
    }

    /// Records a write of `id` with the given field set.
    ///
    /// The creation time is kept from any existing record.
    pub fn upsert(&self, id: &ObjectId, fields: Vec<String>) -> DataMeta {
        let mut records = self.records.write();
        match records.get_mut(id) {
            Some(meta) => {
                meta.touch(fields);
                meta.clone()
            }
            None => {
                let meta = DataMeta::new(id, fields);
                records.insert(id.clone(), meta.clone());
                meta
            }
        }
    }

    /// Removes the record for `id`.
    pub fn remove_record(&self, id: &ObjectId) -> Option<DataMeta> {
        self.records.write().remove(id)
    }

    /// Returns the record for `id`.
    pub fn record(&self, id: &ObjectId) -> Option<DataMeta> {
        self.records.read().get(id).cloned()
    }

    /// Returns true if `id` has a record.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.records.read().contains_key(id)
    }

    /// Returns ids of documents having `field`, sorted.
    pub fn ids_with_field(&self, field: &str) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .records
            .read()
            .iter()
            .filter(|(_, meta)| meta.has_field(field))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Returns every id, sorted.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.records.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns every record, sorted by id.
    pub fn snapshot(&self) -> Vec<DataMeta> {
        let mut records: Vec<DataMeta> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Metadata indexes for every collection of one database.
#[derive(Debug, Default)]
pub struct IndexMetaManager {
    indexes: DashMap<String, Arc<MetaIndex>>,
}

impl IndexMetaManager {
    /// Creates a manager with no loaded collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the index for `collection` from `store` unless already loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata blob is unreadable.
    pub fn load(&self, collection: &str, store: Arc<dyn BlobStore>) -> CoreResult<Arc<MetaIndex>> {
        if let Some(index) = self.indexes.get(collection) {
            return Ok(Arc::clone(&index));
        }
        let index = Arc::new(MetaIndex::load(store)?);
        let entry = self
            .indexes
            .entry(collection.to_string())
            .or_insert_with(|| Arc::clone(&index));
        tracing::debug!(collection, records = entry.len(), "loaded metadata index");
        Ok(Arc::clone(&entry))
    }

    /// Returns the loaded index for `collection`.
    pub fn index(&self, collection: &str) -> Option<Arc<MetaIndex>> {
        self.indexes.get(collection).map(|i| Arc::clone(&i))
    }

    /// Inserts or replaces a record.
    pub fn add_record(&self, collection: &str, meta: DataMeta) -> CoreResult<()> {
        let id = ObjectId::parse(&meta.id)?;
        if let Some(index) = self.index(collection) {
            index.add_record(id, meta);
        }
        Ok(())
    }

    /// Removes a record.
    pub fn remove_record(&self, collection: &str, id: &ObjectId) -> Option<DataMeta> {
        self.index(collection)?.remove_record(id)
    }

    /// Returns a single record.
    pub fn record(&self, collection: &str, id: &ObjectId) -> Option<DataMeta> {
        self.index(collection)?.record(id)
    }

    /// Returns every record of a collection.
    pub fn records(&self, collection: &str) -> Vec<DataMeta> {
        self.index(collection)
            .map(|index| index.snapshot())
            .unwrap_or_default()
    }

    /// Names of collections with a loaded index.
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Persists every loaded index.
    ///
    /// All indexes are attempted; the first failure is returned.
    pub fn save_records(&self) -> CoreResult<()> {
        let mut first_error = None;
        for entry in &self.indexes {
            if let Err(e) = entry.value().save() {
                tracing::error!(collection = %entry.key(), error = %e, "failed to save metadata");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
