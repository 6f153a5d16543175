// src/storage/mod.rs
pub mod final_layer;
pub mod raw;
pub mod sqlite;
pub mod staging;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::frame::Frame;
use crate::utils::error::StorageError;

pub use final_layer::FinalWriter;
pub use raw::RawWriter;
pub use sqlite::SqliteStore;
pub use staging::StagingWriter;

/// Per-dataset "last successful refresh" markers.
pub trait StalenessStore: Send + Sync {
    fn last_updated(&self, dataset: &str) -> Result<Option<DateTime<Utc>>, StorageError>;
    fn set_last_updated(&self, dataset: &str, at: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Durable destination of final datasets. Both operations must be safe to
/// repeat with the same rows.
pub trait LoadSink: Send + Sync {
    /// Inserts or replaces rows keyed by `key` columns. Returns rows written.
    fn upsert(&self, collection: &str, rows: &Frame, key: &[&str]) -> Result<usize, StorageError>;
    /// Appends rows, silently skipping ones already stored. Returns rows inserted.
    fn insert_many(&self, collection: &str, rows: &Frame) -> Result<usize, StorageError>;
}

/// Creates `dir` (and parents) if it does not exist yet.
pub(crate) fn ensure_dir(dir: &Path) -> Result<PathBuf, StorageError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(StorageError::IoError)?;
    }
    Ok(dir.to_path_buf())
}

/// `<name>_<YYYYmmdd_HHMMSS_mmm>` in UTC.
pub(crate) fn timestamped(name: &str) -> String {
    format!("{}_{}", name, Utc::now().format("%Y%m%d_%H%M%S_%3f"))
}

/// Creates a new file `<dir>/<stem>.<ext>` without ever replacing an existing
/// one; on collision a numeric suffix is appended.
pub(crate) fn create_new_file(dir: &Path, stem: &str, ext: &str) -> Result<(PathBuf, fs::File), StorageError> {
    for attempt in 0..100u32 {
        let filename = if attempt == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}_{}.{}", stem, attempt, ext)
        };
        let path = dir.join(filename);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StorageError::IoError(e)),
        }
    }
    Err(StorageError::FileExists(dir.join(format!("{}.{}", stem, ext)).display().to_string()))
}
