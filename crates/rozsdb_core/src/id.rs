//! Document identifier.

use crate::error::{CoreError, CoreResult};
use rand::Rng;
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Length of generated identifiers.
pub const OBJECT_ID_LEN: usize = 12;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Unique identifier for a document.
///
/// Generated identifiers are [`OBJECT_ID_LEN`] symbols drawn from a
/// 62-symbol alphabet using a cryptographically secure generator. They are:
/// - Unique within the process with overwhelming probability
/// - Immutable once assigned
/// - Never empty
///
/// The identifier doubles as the document's file name, so parsed ids are
/// restricted to `[0-9A-Za-z_-]`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..OBJECT_ID_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        Self(id)
    }

    /// Parses a client-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidObjectId`] for empty input or input with
    /// characters outside `[0-9A-Za-z_-]`.
    pub fn parse(value: &str) -> CoreResult<Self> {
        let valid = !value.is_empty()
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(CoreError::InvalidObjectId {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}
