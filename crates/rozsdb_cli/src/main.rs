//! RozsDB CLI
//!
//! Runs the RozsDB server and inspects database roots.
//!
//! # Commands
//!
//! - `serve` - Serve a database root over TCP
//! - `inspect` - Display databases, collections and sizes
//! - `dump-meta` - Dump a collection's metadata records
//! - `version` - Show version information

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// RozsDB server and database tools.
#[derive(Parser)]
#[command(name = "rozsdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database root directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Directory receiving one log file per run
    #[arg(global = true, long, default_value = "logs")]
    log_dir: PathBuf,

    /// Log to the console only
    #[arg(global = true, long)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a database root over TCP
    Serve {
        /// Settings file (port, max_client_count, allowed_ips, admins_file)
        #[arg(short, long, default_value = "config/settings.json")]
        settings: PathBuf,

        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port, overriding the settings file
        #[arg(long)]
        port: Option<u16>,

        /// Maximum concurrent clients, overriding the settings file
        #[arg(long)]
        max_clients: Option<usize>,

        /// Keep at most this many documents cached per collection
        #[arg(long)]
        lru: Option<usize>,

        /// Seconds of inactivity before a collection is evicted
        #[arg(long, default_value = "600")]
        idle_timeout: u64,

        /// Seconds between write-behind flushes
        #[arg(long, default_value = "60")]
        flush_interval: u64,
    },

    /// Display databases, collections and sizes
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump a collection's metadata records
    DumpMeta {
        /// Database name
        #[arg(short, long)]
        database: String,

        /// Collection name
        #[arg(short, long)]
        collection: String,

        /// Only records having this field
        #[arg(long)]
        field: Option<String>,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_dir = (!cli.no_log_file).then_some(cli.log_dir.as_path());
    let _log_guard = logging::init(cli.verbose, log_dir)?;

    match cli.command {
        Commands::Serve {
            settings,
            host,
            port,
            max_clients,
            lru,
            idle_timeout,
            flush_interval,
        } => {
            let path = cli.path.ok_or("Database root required for serve")?;
            let options = commands::serve::ServeOptions {
                root: path,
                settings,
                host,
                port,
                max_clients,
                lru,
                idle_timeout,
                flush_interval,
            };
            commands::serve::run(options)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database root required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::DumpMeta {
            database,
            collection,
            field,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Database root required for dump-meta")?;
            commands::dump_meta::run(
                &path,
                &database,
                &collection,
                field.as_deref(),
                limit,
                &format,
            )?;
        }
        Commands::Version => {
            println!("RozsDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("RozsDB Core v{}", rozsdb_core::VERSION);
        }
    }

    Ok(())
}
