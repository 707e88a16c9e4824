//! # RozsDB Codec
//!
//! Byte-level and JSON-level encoding for RozsDB documents.
//!
//! This crate provides:
//! - Zstandard frame compression for document blobs
//! - [`Document`], an immutable parsed view of a JSON object
//! - [`DocumentBuilder`], used while constructing a document
//! - [`values_match`], type-aware equality for predicate queries
//!
//! ## Usage
//!
//! ```
//! use rozsdb_codec::{Document, DocumentBuilder};
//!
//! let doc = DocumentBuilder::from_json(r#"{"name":"a"}"#)
//!     .unwrap()
//!     .with_id("0123456789ab")
//!     .build();
//! let frame = doc.to_frame().unwrap();
//!
//! let restored = Document::from_frame(&frame).unwrap();
//! assert_eq!(restored.id(), Some("0123456789ab"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod compress;
mod document;
mod error;
mod matcher;

pub use compress::{compress, decompress, decompress_str, COMPRESSION_LEVEL};
pub use document::{Document, DocumentBuilder, ID_FIELD};
pub use error::{CodecError, CodecResult};
pub use matcher::{values_match, FLOAT_EPSILON};

/// Re-exported JSON value type used by query APIs.
pub use serde_json::Value;
