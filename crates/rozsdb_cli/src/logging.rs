//! Log output: the console plus one file per run.

use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Name of the log file for a run started at `started`.
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("logs-{}.txt", started.format("%Y-%m-%d_%H-%M-%S"))
}

/// Creates `dir` if needed and opens this run's log file in it.
pub fn open_log_file(dir: &Path, started: DateTime<Local>) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(started));
    let file = File::options().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Installs the global subscriber.
///
/// With a `log_dir`, every event is also written without ANSI colors to a
/// new file in that directory. The returned guard flushes the file writer
/// when dropped, so it must live until the process exits.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_layer, guard, path) = match log_dir {
        Some(dir) => {
            let (path, file) = open_log_file(dir, Local::now())?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard), Some(path))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(path) = path {
        tracing::debug!(path = %path.display(), "writing log file");
    }
    Ok(guard)
}
