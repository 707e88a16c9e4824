//! Serve command implementation.

use rozsdb_core::{CacheStrategy, Config, Engine};
use rozsdb_server::{IpAllowList, RozsServer, ServerSettings, UserRegistry};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Options for the serve command.
#[derive(Debug)]
pub struct ServeOptions {
    /// Database root.
    pub root: PathBuf,
    /// Settings file.
    pub settings: PathBuf,
    /// Address to bind to.
    pub host: IpAddr,
    /// Port override.
    pub port: Option<u16>,
    /// Client limit override.
    pub max_clients: Option<usize>,
    /// LRU capacity; unbounded caching when absent.
    pub lru: Option<usize>,
    /// Idle eviction window in seconds.
    pub idle_timeout: u64,
    /// Write-behind flush period in seconds.
    pub flush_interval: u64,
}

/// Runs the serve command until Ctrl-C.
pub fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let settings = ServerSettings::load(&options.settings)?;

    let users = match &settings.admins_file {
        Some(path) => UserRegistry::load(path)?,
        None => {
            tracing::warn!("no admins file configured, every request will be rejected");
            UserRegistry::new()
        }
    };
    let ip_gate = IpAllowList::new(&settings.allowed_ips);

    let mut server_config = settings.server_config(options.host);
    if let Some(port) = options.port {
        server_config.bind_addr.set_port(port);
    }
    if let Some(max) = options.max_clients {
        server_config = server_config.with_max_clients(max);
    }

    let engine = Arc::new(Engine::open(&options.root, engine_config(&options))?);
    tracing::info!(
        root = %options.root.display(),
        databases = engine.pool().names().len(),
        "engine opened"
    );

    let server = Arc::new(RozsServer::new(
        server_config,
        Arc::clone(&engine),
        Arc::new(users),
        Arc::new(ip_gate),
    ));

    let runtime = tokio::runtime::Runtime::new()?;
    let served = runtime.block_on(server.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
        }
    }));

    tracing::info!("shutting down");
    engine.shutdown()?;
    served?;
    Ok(())
}

fn engine_config(options: &ServeOptions) -> Config {
    let strategy = match options.lru {
        Some(capacity) => CacheStrategy::Lru { capacity },
        None => CacheStrategy::Unbounded,
    };
    Config::default()
        .cache_strategy(strategy)
        .idle_timeout(Duration::from_secs(options.idle_timeout))
        .flush_interval(Duration::from_secs(options.flush_interval))
}
