// src/storage/raw.rs
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::storage::{create_new_file, ensure_dir, timestamped};
use crate::utils::error::StorageError;

/// Bronze layer: verbatim API payloads, one timestamped JSON file per extract.
pub struct RawWriter {
    base_dir: PathBuf,
}

impl RawWriter {
    /// Creates a new RawWriter, creating `base_dir` if needed.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        Ok(Self {
            base_dir: ensure_dir(base_dir.as_ref())?,
        })
    }

    /// Writes `payload` as pretty JSON to `<base>/<name>_<timestamp>.json`.
    pub fn save<T: Serialize + ?Sized>(&self, name: &str, payload: &T) -> Result<PathBuf, StorageError> {
        let body = serde_json::to_string_pretty(payload)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let (path, mut file) = create_new_file(&self.base_dir, &timestamped(name), "json")?;
        file.write_all(body.as_bytes()).map_err(StorageError::IoError)?;

        tracing::info!("Saved raw payload to {}", path.display());
        Ok(path)
    }
}
