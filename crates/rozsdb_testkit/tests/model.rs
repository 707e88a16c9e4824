//! Model-based tests: a collection behaves like a map from id to document.

use proptest::prelude::*;
use rozsdb_codec::Document;
use rozsdb_testkit::prelude::*;
use serde_json::Value;
use std::collections::HashMap;

fn content(frame: &[u8]) -> Value {
    let mut value = Document::from_frame(frame).unwrap().into_value();
    value.as_object_mut().unwrap().remove("$id");
    value
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn collection_matches_model(ops in operation_sequence_strategy(1, 40)) {
        let engine = TestEngine::new();
        let collection = engine.collection(TEST_COLLECTION);
        let mut model: HashMap<String, Value> = HashMap::new();

        for op in ops {
            match op {
                DocumentOperation::Upsert { id, json } => {
                    collection.insert_or_update(Some(id.clone()), &json).unwrap();
                    model.insert(id.to_string(), serde_json::from_str(&json).unwrap());
                }
                DocumentOperation::Delete { id } => {
                    let existed = collection.delete(&id).unwrap();
                    prop_assert_eq!(existed, model.remove(id.as_str()).is_some());
                }
                DocumentOperation::Get { id } => {
                    let found = collection.find_by_id(&id).unwrap().map(|f| content(&f));
                    prop_assert_eq!(found.as_ref(), model.get(id.as_str()));
                }
            }
        }

        prop_assert_eq!(collection.len(), model.len());
        prop_assert_eq!(collection.find_all().unwrap().len(), model.len());
    }

    #[test]
    fn documents_survive_reopen(docs in prop::collection::vec(document_json_strategy(), 1..10)) {
        let engine = TestEngine::new();
        let collection = engine.collection(TEST_COLLECTION);
        let mut expected = HashMap::new();
        for json in &docs {
            let frame = collection.insert_or_update(None, json).unwrap();
            let id = Document::from_frame(&frame).unwrap().id().unwrap().to_string();
            expected.insert(id, serde_json::from_str::<Value>(json).unwrap());
        }
        drop(collection);

        let engine = engine.reopen();
        let collection = engine.collection(TEST_COLLECTION);
        let mut found = HashMap::new();
        for frame in collection.find_all().unwrap() {
            let doc = Document::from_frame(&frame).unwrap();
            found.insert(doc.id().unwrap().to_string(), content(&frame));
        }
        prop_assert_eq!(found, expected);
    }
}
