//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use rozsdb_core::{Config, Engine, Services};
use std::sync::Arc;
use tempfile::TempDir;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a JSON document with `fields` string fields of `value_len`
/// characters each, plus an integer `index`.
pub fn random_document(index: usize, fields: usize, value_len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut json = format!(r#"{{"index":{index}"#);
    for f in 0..fields {
        let value: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(value_len)
            .map(char::from)
            .collect();
        json.push_str(&format!(r#","field_{f}":"{value}""#));
    }
    json.push('}');
    json
}

/// An engine over a temporary root with manual services.
pub fn temp_engine() -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    let services = Arc::new(Services::manual(Config::default()));
    let engine = Engine::open_with_services(dir.path(), services).unwrap();
    engine.create_database("bench").unwrap();
    (dir, engine)
}
