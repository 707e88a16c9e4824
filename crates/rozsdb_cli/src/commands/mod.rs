//! CLI command implementations.

pub mod dump_meta;
pub mod inspect;
pub mod serve;

use rozsdb_core::{Config, Engine, Services};
use std::path::Path;
use std::sync::Arc;

/// Opens an existing root for offline inspection.
///
/// No background threads run, so nothing is evicted or flushed behind the
/// command's back.
pub fn open_offline(path: &Path) -> Result<Engine, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No database root found at {}", path.display()).into());
    }
    let config = Config::default().create_if_missing(false);
    let services = Arc::new(Services::manual(config));
    Ok(Engine::open_with_services(path, services)?)
}
