//! Inspect command implementation.

use super::open_offline;
use rozsdb_core::META_FILE;
use serde::Serialize;
use std::path::Path;

/// Root inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Root path.
    pub path: String,
    /// Per-database details.
    pub databases: Vec<DatabaseInfo>,
    /// Total bytes of document and metadata files.
    pub total_size: u64,
}

/// Details for one database.
#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Per-collection details.
    pub collections: Vec<CollectionInfo>,
}

/// Details for one collection.
#[derive(Debug, Serialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Documents on disk.
    pub document_files: usize,
    /// Metadata records.
    pub meta_records: usize,
    /// Bytes of document files.
    pub data_size: u64,
    /// Bytes of the metadata file.
    pub meta_size: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text(&result),
    }
    Ok(())
}

/// Gathers sizes and record counts for every database under `path`.
pub fn collect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let engine = open_offline(path)?;

    let mut databases = Vec::new();
    let mut total_size = 0;
    for database in engine.pool().databases() {
        let mut collections = Vec::new();
        for name in database.collection_names() {
            let mut info = CollectionInfo {
                name: name.clone(),
                document_files: 0,
                meta_records: database.meta().records(&name).len(),
                data_size: 0,
                meta_size: 0,
            };
            for entry in std::fs::read_dir(database.path().join(&name))? {
                let entry = entry?;
                let metadata = entry.metadata()?;
                if !metadata.is_file() {
                    continue;
                }
                if entry.file_name() == META_FILE {
                    info.meta_size = metadata.len();
                } else {
                    info.document_files += 1;
                    info.data_size += metadata.len();
                }
            }
            total_size += info.data_size + info.meta_size;
            collections.push(info);
        }
        databases.push(DatabaseInfo {
            name: database.name().to_string(),
            collections,
        });
    }
    databases.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(InspectResult {
        path: path.display().to_string(),
        databases,
        total_size,
    })
}

fn print_text(result: &InspectResult) {
    println!("Root: {}", result.path);
    println!("Total size: {} bytes", result.total_size);
    println!();
    for database in &result.databases {
        println!("Database: {}", database.name);
        if database.collections.is_empty() {
            println!("  (no collections)");
        }
        for c in &database.collections {
            println!(
                "  {:<24} {:>8} docs {:>8} meta {:>12} bytes",
                c.name, c.document_files, c.meta_records, c.data_size
            );
            if c.document_files != c.meta_records {
                println!("    warning: document files and metadata records differ");
            }
        }
    }
}
