//! The set of databases under one root directory.

use crate::database::{validate_name, Database};
use crate::dir::subdirectories;
use crate::engine::Services;
use crate::error::{CoreError, CoreResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Every database found under the root, keyed by name.
pub struct DatabasePool {
    root: PathBuf,
    databases: DashMap<String, Arc<Database>>,
    services: Arc<Services>,
}

impl DatabasePool {
    /// Opens every database directory under `root`.
    ///
    /// Directories whose names are not valid database names are skipped.
    pub(crate) fn load(root: &Path, services: Arc<Services>) -> CoreResult<Self> {
        let pool = Self {
            root: root.to_path_buf(),
            databases: DashMap::new(),
            services,
        };
        for name in subdirectories(root)? {
            if let Err(e) = validate_name(&name) {
                tracing::warn!(error = %e, "skipping directory in data root");
                continue;
            }
            let database = Database::open(&root.join(&name), Arc::clone(&pool.services))?;
            pool.databases.insert(name, database);
        }
        tracing::info!(root = %root.display(), databases = pool.databases.len(), "database pool loaded");
        Ok(pool)
    }

    /// Returns the database called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseNotFound`] if no such database exists.
    pub fn get(&self, name: &str) -> CoreResult<Arc<Database>> {
        self.databases
            .get(name)
            .map(|db| Arc::clone(&db))
            .ok_or_else(|| CoreError::database_not_found(name))
    }

    /// Returns the database called `name`, creating it if missing.
    pub fn create(&self, name: &str) -> CoreResult<Arc<Database>> {
        validate_name(name)?;
        match self.databases.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let database = Database::open(&self.root.join(name), Arc::clone(&self.services))?;
                entry.insert(Arc::clone(&database));
                tracing::info!(database = name, "database created");
                Ok(database)
            }
        }
    }

    /// Sorted database names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Every database, in name order.
    pub fn databases(&self) -> Vec<Arc<Database>> {
        let mut databases: Vec<Arc<Database>> =
            self.databases.iter().map(|e| Arc::clone(e.value())).collect();
        databases.sort_by(|a, b| a.name().cmp(b.name()));
        databases
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Closes every database. The first failure is returned.
    pub fn close_all(&self) -> CoreResult<()> {
        let mut first_error = None;
        for database in self.databases() {
            if let Err(e) = database.close() {
                tracing::error!(database = database.name(), error = %e, "failed to close database");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("root", &self.root)
            .field("databases", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::tempdir;

    fn services() -> Arc<Services> {
        Arc::new(Services::manual(Config::default()))
    }

    #[test]
    fn loads_existing_databases() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("shop/orders")).unwrap();
        fs::create_dir(temp.path().join("blog")).unwrap();
        fs::write(temp.path().join("LOCK"), b"").unwrap();

        let pool = DatabasePool::load(temp.path(), services()).unwrap();
        assert_eq!(pool.names(), vec!["blog", "shop"]);
        assert_eq!(pool.get("shop").unwrap().collection_names(), vec!["orders"]);
    }

    #[test]
    fn missing_database() {
        let temp = tempdir().unwrap();
        let pool = DatabasePool::load(temp.path(), services()).unwrap();
        let err = pool.get("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn create_is_idempotent() {
        let temp = tempdir().unwrap();
        let pool = DatabasePool::load(temp.path(), services()).unwrap();
        let a = pool.create("app").unwrap();
        let b = pool.create("app").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(temp.path().join("app").is_dir());
        assert!(pool.create("bad name").is_err());
    }
}
