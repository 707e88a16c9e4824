//! # RozsDB Storage
//!
//! Blob store trait and implementations for RozsDB.
//!
//! This crate provides the lowest-level storage abstraction for RozsDB.
//! A blob store is a flat namespace of **opaque byte blobs** - it does not
//! interpret the frames it stores.
//!
//! ## Design Principles
//!
//! - One store per collection, one blob per document
//! - Writes are whole-blob replacements, made durable before returning
//! - No knowledge of compression, JSON, or metadata formats
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - one file per key inside a directory
//! - [`InMemoryBackend`] - for testing and ephemeral storage
//!
//! ## Example
//!
//! ```rust
//! use rozsdb_storage::{BlobStore, InMemoryBackend};
//!
//! let store = InMemoryBackend::new();
//! store.write("doc", b"hello world").unwrap();
//! assert_eq!(store.keys().unwrap(), vec!["doc".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::BlobStore;
pub use error::{validate_key, StorageError, StorageResult};
pub use file::{FileBackend, LargeReadGate, LargeReadPermit, LARGE_FILE_THRESHOLD};
pub use memory::InMemoryBackend;
