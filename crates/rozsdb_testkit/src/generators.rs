//! Property-based test generators using proptest.
//!
//! Documents are generated as JSON text with at least one field, never
//! using the reserved `$id` key.

use proptest::prelude::*;
use rozsdb_core::ObjectId;
use serde_json::{Map, Value};

/// Strategy for ids a client might choose.
pub fn object_id_strategy() -> impl Strategy<Value = ObjectId> {
    prop::string::string_regex("[0-9A-Za-z_-]{1,24}")
        .expect("Invalid regex")
        .prop_map(|s| ObjectId::parse(&s).expect("generated id must parse"))
}

/// Strategy for valid database and collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,9}").expect("Invalid regex")
}

/// Strategy for scalar JSON values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        (-4_000_000i64..4_000_000).prop_map(|n| Value::from(n as f64 / 4.0)),
        prop::string::string_regex("[ -~]{0,16}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for flat JSON objects.
pub fn json_object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(field_name_strategy(), scalar_strategy(), 1..6)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for document bodies as JSON text.
pub fn document_json_strategy() -> impl Strategy<Value = String> {
    json_object_strategy().prop_map(|object| Value::Object(object).to_string())
}

/// Strategy for arbitrary payloads, including empty ones.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

/// A collection operation for model-based tests.
#[derive(Debug, Clone)]
pub enum DocumentOperation {
    /// Insert or replace a document
    Upsert {
        /// Document id
        id: ObjectId,
        /// Document body
        json: String,
    },
    /// Delete a document
    Delete {
        /// Document id
        id: ObjectId,
    },
    /// Read a document
    Get {
        /// Document id
        id: ObjectId,
    },
}

/// Strategy for one operation over a small id space, so operations
/// collide often.
pub fn document_operation_strategy() -> impl Strategy<Value = DocumentOperation> {
    let id = (0u8..8).prop_map(|n| ObjectId::parse(&format!("doc{n}")).expect("valid id"));
    prop_oneof![
        3 => (id.clone(), document_json_strategy())
            .prop_map(|(id, json)| DocumentOperation::Upsert { id, json }),
        1 => id.clone().prop_map(|id| DocumentOperation::Delete { id }),
        2 => id.prop_map(|id| DocumentOperation::Get { id }),
    ]
}

/// Strategy for a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<DocumentOperation>> {
    prop::collection::vec(document_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rozsdb_core::validate_name;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn names_are_valid(name in collection_name_strategy()) {
            prop_assert!(validate_name(&name).is_ok());
        }

        #[test]
        fn documents_are_objects(json in document_json_strategy()) {
            let value: Value = serde_json::from_str(&json).unwrap();
            let object = value.as_object().unwrap();
            prop_assert!(!object.is_empty());
            prop_assert!(!object.contains_key("$id"));
        }

        #[test]
        fn ids_round_trip_through_parse(id in object_id_strategy()) {
            prop_assert_eq!(ObjectId::parse(id.as_str()).unwrap(), id);
        }
    }
}
