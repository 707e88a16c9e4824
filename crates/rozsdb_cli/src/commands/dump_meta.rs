//! Dump-meta command implementation.

use super::open_offline;
use rozsdb_core::DataMeta;
use std::path::Path;

/// Runs the dump-meta command.
pub fn run(
    path: &Path,
    database: &str,
    collection: &str,
    field: Option<&str>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = collect(path, database, collection, field, limit)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => {
            println!("{database}/{collection}: {} record(s)", records.len());
            for record in &records {
                println!(
                    "{:<16} created={} updated={} fields=[{}]",
                    record.id,
                    record.created_at,
                    record.updated_at,
                    record.fields.join(", ")
                );
            }
        }
    }
    Ok(())
}

/// Loads metadata records, oldest first.
pub fn collect(
    path: &Path,
    database: &str,
    collection: &str,
    field: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<DataMeta>, Box<dyn std::error::Error>> {
    let engine = open_offline(path)?;
    let db = engine.database(database)?;
    if !db.collection_names().iter().any(|name| name == collection) {
        return Err(format!("Collection {collection:?} not found in {database:?}").into());
    }

    let mut records: Vec<DataMeta> = db
        .meta()
        .records(collection)
        .into_iter()
        .filter(|record| field.map_or(true, |f| record.has_field(f)))
        .collect();
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rozsdb_core::{Config, Engine};

    fn seeded_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path(), Config::default()).unwrap();
        engine.create_database("app").unwrap();
        let users = engine.collection("app", "users").unwrap();
        users.insert_or_update(None, r#"{"name":"a","age":3}"#).unwrap();
        users.insert_or_update(None, r#"{"name":"b"}"#).unwrap();
        users.insert_or_update(None, r#"{"name":"c"}"#).unwrap();
        engine.shutdown().unwrap();
        dir
    }

    #[test]
    fn filters_and_limits() {
        let dir = seeded_root();

        let all = collect(dir.path(), "app", "users", None, None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|r| !r.fields.iter().any(|f| f == "$id")));

        let aged = collect(dir.path(), "app", "users", Some("age"), None).unwrap();
        assert_eq!(aged.len(), 1);

        let limited = collect(dir.path(), "app", "users", None, Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn unknown_names_are_errors() {
        let dir = seeded_root();
        assert!(collect(dir.path(), "nope", "users", None, None).is_err());
        assert!(collect(dir.path(), "app", "nope", None, None).is_err());
    }
}
