//! Databases: named groups of collections sharing one directory.

use crate::collection::Collection;
use crate::dir::subdirectories;
use crate::engine::Services;
use crate::error::{CoreError, CoreResult};
use crate::meta::IndexMetaManager;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rozsdb_storage::{BlobStore, FileBackend};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// Longest accepted database or collection name.
pub const MAX_NAME_LEN: usize = 64;

/// Checks that `name` can be used as a database or collection directory.
///
/// Names are 1 to [`MAX_NAME_LEN`] characters from `[A-Za-z0-9_.-]` and
/// may not be `.` or `..`.
pub fn validate_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_name(name, "name is empty"));
    }
    if name == "." || name == ".." {
        return Err(CoreError::invalid_name(name, "name is reserved"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::invalid_name(name, "name is too long"));
    }
    let allowed = name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));
    if !allowed {
        return Err(CoreError::invalid_name(
            name,
            "only letters, digits, '_', '-' and '.' are allowed",
        ));
    }
    Ok(())
}

/// A directory of collections.
///
/// Collections are hydrated lazily on first access and dropped from the
/// registry when evicted. Metadata indexes for every collection on disk are
/// loaded when the database opens and outlive evictions.
pub struct Database {
    name: String,
    dir: PathBuf,
    collections: DashMap<String, Arc<Collection>>,
    stores: DashMap<String, Arc<dyn BlobStore>>,
    meta: IndexMetaManager,
    services: Arc<Services>,
    self_ref: Weak<Database>,
}

impl Database {
    /// Opens the database stored in `dir`, creating the directory if needed.
    pub(crate) fn open(dir: &Path, services: Arc<Services>) -> CoreResult<Arc<Self>> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        validate_name(&name)?;
        fs::create_dir_all(dir)?;

        let database = Arc::new_cyclic(|weak| Self {
            name,
            dir: dir.to_path_buf(),
            collections: DashMap::new(),
            stores: DashMap::new(),
            meta: IndexMetaManager::new(),
            services,
            self_ref: weak.clone(),
        });

        for collection in subdirectories(dir)? {
            if let Err(e) = validate_name(&collection) {
                tracing::warn!(database = %database.name, error = %e, "skipping directory");
                continue;
            }
            let store = database.store(&collection)?;
            database.meta.load(&collection, store)?;
        }

        tracing::info!(
            database = %database.name,
            collections = database.meta.collections().len(),
            "database loaded"
        );
        Ok(database)
    }

    /// Returns the collection called `name`, hydrating it if necessary.
    ///
    /// Unknown names create a new, empty collection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidName`] if `name` cannot be a directory,
    /// or an error if hydration fails.
    pub fn collection(&self, name: &str) -> CoreResult<Arc<Collection>> {
        validate_name(name)?;
        if let Some(existing) = self.collections.get(name) {
            if !existing.is_timed_out() {
                return Ok(Arc::clone(&existing));
            }
        }

        let store = self.store(name)?;
        let meta = self.meta.load(name, Arc::clone(&store))?;
        // Hydrate without holding a registry shard lock. If another caller
        // registered a live instance meanwhile, theirs wins and ours is
        // dropped, which cancels its idle timer.
        let collection = Collection::open(
            name,
            store,
            meta,
            Arc::clone(&self.services),
            self.self_ref.clone(),
        )?;

        match self.collections.entry(name.to_string()) {
            Entry::Occupied(entry) if !entry.get().is_timed_out() => Ok(Arc::clone(entry.get())),
            Entry::Occupied(mut entry) => {
                entry.insert(Arc::clone(&collection));
                Ok(collection)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&collection));
                Ok(collection)
            }
        }
    }

    /// Returns the collection if it is currently hydrated.
    pub fn loaded(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.get(name).map(|c| Arc::clone(&c))
    }

    /// Removes `collection` from the registry if it is still the
    /// registered instance for its name.
    pub(crate) fn unregister(&self, collection: &Collection) {
        let removed = self
            .collections
            .remove_if(collection.name(), |_, registered| {
                std::ptr::eq(Arc::as_ptr(registered), collection)
            })
            .is_some();
        if removed {
            tracing::debug!(database = %self.name, collection = collection.name(), "collection unregistered");
        }
    }

    /// Names of every collection known on disk or created since opening.
    pub fn collection_names(&self) -> Vec<String> {
        self.meta.collections()
    }

    /// Names of currently hydrated collections.
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Returns the metadata indexes.
    pub fn meta(&self) -> &IndexMetaManager {
        &self.meta
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the database directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Flushes every hydrated collection and saves all metadata.
    pub fn save(&self) -> CoreResult<()> {
        let loaded: Vec<Arc<Collection>> = self.collections.iter().map(|e| Arc::clone(e.value())).collect();
        for collection in loaded {
            collection.save()?;
        }
        self.meta.save_records()
    }

    /// Evicts every hydrated collection and saves all metadata.
    ///
    /// Every collection is attempted; the first failure is returned.
    pub fn close(&self) -> CoreResult<()> {
        let loaded: Vec<Arc<Collection>> = self.collections.iter().map(|e| Arc::clone(e.value())).collect();
        let mut first_error = None;
        for collection in loaded {
            if let Err(e) = collection.close() {
                tracing::error!(collection = collection.name(), error = %e, "failed to close collection");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.meta.save_records() {
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }

    fn store(&self, collection: &str) -> CoreResult<Arc<dyn BlobStore>> {
        if let Some(store) = self.stores.get(collection) {
            return Ok(Arc::clone(&store));
        }
        let backend: Arc<dyn BlobStore> = Arc::new(FileBackend::open_with_gate(
            &self.dir.join(collection),
            Arc::clone(&self.services.read_gate),
        )?);
        let store = self
            .stores
            .entry(collection.to_string())
            .or_insert(backend);
        Ok(Arc::clone(&store))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("path", &self.dir)
            .field("loaded", &self.loaded_names())
            .finish()
    }
}
