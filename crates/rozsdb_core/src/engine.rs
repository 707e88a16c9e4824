//! Engine facade and shutdown.

use crate::collection::Collection;
use crate::config::Config;
use crate::database::Database;
use crate::dir::RootDir;
use crate::error::{CoreError, CoreResult};
use crate::pool::DatabasePool;
use crate::timeout::TimeoutManager;
use crate::write_pool::WritePool;
use parking_lot::RwLock;
use rozsdb_storage::LargeReadGate;
use std::path::Path;
use std::sync::Arc;

/// Background services shared by every database and collection of an
/// engine.
#[derive(Debug)]
pub struct Services {
    /// Engine configuration.
    pub config: Config,
    /// Write-behind queue.
    pub write_pool: WritePool,
    /// Idle-eviction scheduler.
    pub timeouts: TimeoutManager,
    /// Limits concurrent reads of large document files.
    pub read_gate: Arc<LargeReadGate>,
}

impl Services {
    /// Starts the flusher and scheduler threads.
    ///
    /// # Errors
    ///
    /// Returns an error if a background thread cannot be spawned.
    pub fn start(config: Config) -> CoreResult<Self> {
        let write_pool = WritePool::start(config.flush_interval, config.flush_batch_size)?;
        let timeouts = TimeoutManager::start(config.tick_interval)?;
        Ok(Self {
            config,
            write_pool,
            timeouts,
            read_gate: Arc::new(LargeReadGate::for_host()),
        })
    }

    /// Creates services without background threads.
    ///
    /// Queued writes and expired timers only take effect when flushed or
    /// run explicitly.
    pub fn manual(config: Config) -> Self {
        Self {
            write_pool: WritePool::manual(config.flush_batch_size),
            timeouts: TimeoutManager::manual(),
            read_gate: Arc::new(LargeReadGate::for_host()),
            config,
        }
    }
}

/// The main engine handle.
///
/// `Engine` owns everything a running RozsDB instance needs: the locked
/// root directory, the pool of databases found under it, the write-behind
/// queue and the idle-eviction scheduler.
///
/// # Example
///
/// ```rust,ignore
/// use rozsdb_core::{Config, Engine};
/// use std::path::Path;
///
/// let engine = Engine::open(Path::new("data"), Config::default())?;
/// engine.create_database("app")?;
/// let users = engine.collection("app", "users")?;
/// users.insert_or_update(None, r#"{"name":"alice"}"#)?;
///
/// engine.shutdown()?;
/// ```
pub struct Engine {
    root: RootDir,
    pool: DatabasePool,
    services: Arc<Services>,
    is_open: RwLock<bool>,
}

impl Engine {
    /// Opens the engine rooted at `path` and loads every database.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The root is missing and `create_if_missing` is false
    /// - Another process holds the root (returns `DatabaseLocked`)
    /// - A metadata file cannot be read
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        let services = Arc::new(Services::start(config)?);
        Self::open_with_services(path, services)
    }

    /// Opens the engine with caller-supplied services.
    pub fn open_with_services(path: &Path, services: Arc<Services>) -> CoreResult<Self> {
        let root = RootDir::open(path, services.config.create_if_missing)?;
        let pool = DatabasePool::load(root.path(), Arc::clone(&services))?;
        tracing::info!(root = %root.path().display(), "engine opened");
        Ok(Self {
            root,
            pool,
            services,
            is_open: RwLock::new(true),
        })
    }

    /// Returns the database called `name`.
    pub fn database(&self, name: &str) -> CoreResult<Arc<Database>> {
        self.ensure_open()?;
        self.pool.get(name)
    }

    /// Returns the database called `name`, creating it if missing.
    pub fn create_database(&self, name: &str) -> CoreResult<Arc<Database>> {
        self.ensure_open()?;
        self.pool.create(name)
    }

    /// Returns a collection of an existing database.
    pub fn collection(&self, database: &str, collection: &str) -> CoreResult<Arc<Collection>> {
        self.database(database)?.collection(collection)
    }

    /// Returns the database pool.
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Returns the shared background services.
    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.services.config
    }

    /// Returns the root directory.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Returns true until [`shutdown`](Self::shutdown) is called.
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Stops the engine.
    ///
    /// Stops idle eviction, drains the write-behind queue, then flushes
    /// every hydrated collection and saves all metadata. Calling this more
    /// than once is a no-op.
    pub fn shutdown(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        *is_open = false;

        self.services.timeouts.shutdown();
        self.services.write_pool.shutdown();
        let result = self.pool.close_all();
        tracing::info!(root = %self.root.path().display(), "engine shut down");
        result
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::EngineClosed)
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("root", &self.root.path())
            .field("databases", &self.pool.names())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "engine shutdown failed");
        }
    }
}
