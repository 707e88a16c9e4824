//! Data directory management.
//!
//! This module handles the file system layout for RozsDB:
//!
//! ```text
//! <root>/
//! ├─ LOCK                     # Advisory lock for single-process access
//! └─ <database>/
//!    └─ <collection>/
//!       ├─ meta.rozs          # Compressed DataMeta records
//!       └─ <ObjectId>         # One compressed document per file
//! ```
//!
//! The LOCK file ensures only one process serves a root at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// The engine's root directory, locked for exclusive access.
///
/// The lock is released when this value is dropped.
#[derive(Debug)]
pub struct RootDir {
    path: PathBuf,
    _lock_file: File,
}

impl RootDir {
    /// Opens or creates the root directory and takes the LOCK file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::InvalidRoot {
                    message: format!("directory does not exist: {}", path.display()),
                });
            }
        }

        if !path.is_dir() {
            return Err(CoreError::InvalidRoot {
                message: format!("path is not a directory: {}", path.display()),
            });
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lists the names of immediate subdirectories, sorted.
///
/// Entries whose names are not valid UTF-8 are skipped.
pub fn subdirectories(path: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => tracing::warn!(name = ?raw, "skipping non-UTF-8 directory"),
        }
    }
    names.sort();
    Ok(names)
}
