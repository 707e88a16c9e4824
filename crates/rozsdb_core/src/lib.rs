//! # RozsDB Core
//!
//! Collection storage engine for RozsDB.
//!
//! This crate provides:
//! - Collections: in-memory caches over directories of compressed documents
//! - A write-behind queue that persists mutations in batches
//! - Idle eviction of collections that have not been used for a while
//! - A per-collection field index that lets predicate queries skip
//!   documents without decompressing them
//! - The [`Engine`] that owns all of the above for one data directory
//!
//! ## Layout on disk
//!
//! ```text
//! <root>/<database>/<collection>/<ObjectId>    one zstd frame per document
//! <root>/<database>/<collection>/meta.rozs     DataMeta records
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use rozsdb_core::{Config, Engine};
//! use std::path::Path;
//!
//! let engine = Engine::open(Path::new("data"), Config::default())?;
//! engine.create_database("app")?;
//!
//! let users = engine.collection("app", "users")?;
//! users.insert_or_update(None, r#"{"name":"alice","age":30}"#)?;
//! let adults = users.find("age", &"30".into())?;
//! assert_eq!(adults.len(), 1);
//!
//! engine.shutdown()?;
//! # Ok::<(), rozsdb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod cache;
mod collection;
mod config;
mod database;
pub mod dir;
mod engine;
mod error;
mod id;
mod meta;
mod pool;
mod stats;
mod timeout;
mod write_pool;

pub use cache::{DocumentCache, LruCache, UnboundedCache};
pub use collection::Collection;
pub use config::{CacheStrategy, Config};
pub use database::{validate_name, Database, MAX_NAME_LEN};
pub use engine::{Engine, Services};
pub use error::{CoreError, CoreResult};
pub use id::{ObjectId, OBJECT_ID_LEN};
pub use meta::{DataMeta, IndexMetaManager, MetaIndex, META_FILE};
pub use pool::DatabasePool;
pub use stats::{CollectionStats, StatsSnapshot};
pub use timeout::{TaskId, TimeoutHandle, TimeoutManager};
pub use write_pool::WritePool;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
