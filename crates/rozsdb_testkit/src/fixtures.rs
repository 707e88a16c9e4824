//! Test fixtures and engine helpers.
//!
//! Engines built here use [`Services::manual`]: nothing is flushed or
//! evicted unless the test asks for it.

use rozsdb_core::{Collection, Config, Engine, Services};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Database created by every fixture.
pub const TEST_DATABASE: &str = "test";

/// Collection used by [`with_temp_collection`].
pub const TEST_COLLECTION: &str = "items";

/// An engine over a temporary root, removed on drop.
pub struct TestEngine {
    /// The engine instance.
    pub engine: Engine,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestEngine {
    /// Creates an engine with manual services and default settings.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an engine with manual services.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let services = Arc::new(Services::manual(config));
        let engine = Engine::open_with_services(temp_dir.path(), services)
            .expect("Failed to open engine");
        engine
            .create_database(TEST_DATABASE)
            .expect("Failed to create test database");
        Self { engine, temp_dir }
    }

    /// Creates an engine with running background threads.
    pub fn background(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine = Engine::open(temp_dir.path(), config).expect("Failed to open engine");
        engine
            .create_database(TEST_DATABASE)
            .expect("Failed to create test database");
        Self { engine, temp_dir }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns a collection of the test database.
    pub fn collection(&self, name: &str) -> Arc<Collection> {
        self.engine
            .collection(TEST_DATABASE, name)
            .expect("Failed to open collection")
    }

    /// Shuts the engine down and opens a fresh one over the same root.
    pub fn reopen(self) -> Self {
        let config = self.engine.config().clone();
        let Self { engine, temp_dir } = self;
        engine.shutdown().expect("Failed to shut down engine");
        drop(engine);

        let services = Arc::new(Services::manual(config));
        let engine = Engine::open_with_services(temp_dir.path(), services)
            .expect("Failed to reopen engine");
        Self { engine, temp_dir }
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test against a fresh temporary engine.
pub fn with_temp_engine<F, R>(f: F) -> R
where
    F: FnOnce(&TestEngine) -> R,
{
    let engine = TestEngine::new();
    f(&engine)
}

/// Runs a test against a collection of a fresh temporary engine.
pub fn with_temp_collection<F, R>(f: F) -> R
where
    F: FnOnce(&Collection) -> R,
{
    let engine = TestEngine::new();
    let collection = engine.collection(TEST_COLLECTION);
    f(&collection)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use rozsdb_core::ObjectId;

    /// Creates an engine whose `items` collection holds `count` documents
    /// of the form `{"index": i, "parity": "even" | "odd"}`.
    pub fn populated_collection(count: usize) -> (TestEngine, Vec<ObjectId>) {
        let engine = TestEngine::new();
        let collection = engine.collection(TEST_COLLECTION);

        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let id = ObjectId::new();
            let parity = if i % 2 == 0 { "even" } else { "odd" };
            let json = format!(r#"{{"index":{i},"parity":"{parity}"}}"#);
            collection
                .insert_or_update(Some(id.clone()), &json)
                .expect("Failed to insert document");
            ids.push(id);
        }

        (engine, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rozsdb_core::ObjectId;

    #[test]
    fn test_engine_has_database() {
        let engine = TestEngine::new();
        assert_eq!(engine.pool().names(), vec![TEST_DATABASE.to_string()]);
    }

    #[test]
    fn test_with_temp_collection() {
        let len = with_temp_collection(|collection| {
            collection.insert_or_update(None, "{}").unwrap();
            collection.len()
        });
        assert_eq!(len, 1);
    }

    #[test]
    fn test_reopen_keeps_documents() {
        let (engine, ids) = scenarios::populated_collection(5);
        let engine = engine.reopen();
        let items = engine.collection(TEST_COLLECTION);
        assert_eq!(items.len(), 5);
        assert!(items.find_by_id(&ids[3]).unwrap().is_some());
        assert!(items.find_by_id(&ObjectId::new()).unwrap().is_none());
    }
}
