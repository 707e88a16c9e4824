//! # RozsDB Testkit
//!
//! Test utilities for RozsDB.
//!
//! This crate provides:
//! - Temporary engines with deterministic (manual) background services
//! - Property-based generators for ids, names and JSON documents
//! - Stress helpers for concurrent collection access
//!
//! ## Usage
//!
//! ```rust
//! use rozsdb_testkit::prelude::*;
//!
//! with_temp_collection(|collection| {
//!     let frame = collection.insert_or_update(None, r#"{"a":1}"#).unwrap();
//!     assert!(!frame.is_empty());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
