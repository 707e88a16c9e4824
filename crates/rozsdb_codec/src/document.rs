//! JSON document views.
//!
//! Parsing and building are split: [`Document`] is an immutable, already
//! validated view with typed accessors, while [`DocumentBuilder`] owns a
//! mutable map and is only used while a document is being constructed.

use crate::compress::{compress, decompress};
use crate::error::{CodecError, CodecResult};
use serde_json::{Map, Value};

/// Name of the field that mirrors a document's identifier into its content.
pub const ID_FIELD: &str = "$id";

/// Returns the JSON type name of a value, for error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn into_object(value: Value) -> CodecResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CodecError::NotAnObject {
            found: type_name(&other),
        }),
    }
}

/// An immutable JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Parses a JSON object from text.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidJson`] for malformed input and
    /// [`CodecError::NotAnObject`] for any non-object JSON value.
    pub fn parse(json: &str) -> CodecResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self {
            fields: into_object(value)?,
        })
    }

    /// Parses a JSON object from UTF-8 bytes.
    pub fn from_slice(bytes: &[u8]) -> CodecResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self {
            fields: into_object(value)?,
        })
    }

    /// Decompresses a stored frame and parses it.
    pub fn from_frame(frame: &[u8]) -> CodecResult<Self> {
        Self::from_slice(&decompress(frame)?)
    }

    /// Returns the value of a top-level field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns true if the top-level field is present (even if null).
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns a top-level string field.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Returns the injected `$id`, if present.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID_FIELD)
    }

    /// Iterates over field names in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field names of user content, excluding the injected `$id`.
    #[must_use]
    pub fn content_fields(&self) -> Vec<String> {
        self.keys()
            .filter(|k| *k != ID_FIELD)
            .map(str::to_owned)
            .collect()
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the object has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serializes back to compact JSON bytes.
    pub fn to_vec(&self) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.fields)?)
    }

    /// Serializes and compresses into a storage frame.
    pub fn to_frame(&self) -> CodecResult<Vec<u8>> {
        compress(&self.to_vec()?)
    }

    /// Returns the document as a `serde_json::Value`.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Owned, mutable JSON object used while constructing a document.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    fields: Map<String, Value>,
}

impl DocumentBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from client-supplied JSON text, which must be an object.
    pub fn from_json(json: &str) -> CodecResult<Self> {
        if json.trim().is_empty() {
            return Err(CodecError::invalid_json("document is empty"));
        }
        let value: Value = serde_json::from_str(json)?;
        Ok(Self {
            fields: into_object(value)?,
        })
    }

    /// Sets a field, replacing any previous value.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Injects the `$id` field.
    #[must_use]
    pub fn with_id(self, id: &str) -> Self {
        self.set(ID_FIELD, id)
    }

    /// Freezes the builder into a [`Document`].
    #[must_use]
    pub fn build(self) -> Document {
        Document {
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_object() {
        let doc = Document::parse(r#"{"name":"a","age":3}"#).unwrap();
        assert_eq!(doc.get_str("name"), Some("a"));
        assert!(doc.has("age"));
        assert!(!doc.has("missing"));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert_eq!(
            Document::parse("[1,2]"),
            Err(CodecError::NotAnObject { found: "array" })
        );
        assert_eq!(
            Document::parse("\"text\""),
            Err(CodecError::NotAnObject { found: "string" })
        );
        assert!(matches!(
            Document::parse("{not json"),
            Err(CodecError::InvalidJson { .. })
        ));
    }

    #[test]
    fn builder_injects_id() {
        let doc = DocumentBuilder::from_json(r#"{"name":"a"}"#)
            .unwrap()
            .with_id("ID123")
            .build();
        assert_eq!(doc.id(), Some("ID123"));
        assert_eq!(doc.content_fields(), vec!["name".to_string()]);
    }

    #[test]
    fn builder_overwrites_client_id() {
        let doc = DocumentBuilder::from_json(r#"{"$id":"forged","x":1}"#)
            .unwrap()
            .with_id("real")
            .build();
        assert_eq!(doc.id(), Some("real"));
    }

    #[test]
    fn builder_rejects_blank_input() {
        assert!(DocumentBuilder::from_json("   ").is_err());
        assert!(DocumentBuilder::from_json("42").is_err());
    }

    #[test]
    fn keys_keep_document_order() {
        let doc = Document::parse(r#"{"z":1,"a":2,"m":3}"#).unwrap();
        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn frame_roundtrip() {
        let doc = DocumentBuilder::new()
            .set("name", "b")
            .set("count", 2)
            .with_id("abc")
            .build();
        let frame = doc.to_frame().unwrap();
        let restored = Document::from_frame(&frame).unwrap();
        assert_eq!(restored, doc);
        assert_eq!(
            restored.into_value(),
            json!({"name": "b", "count": 2, "$id": "abc"})
        );
    }
}
