// src/storage/staging.rs
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::frame::Frame;
use crate::storage::{create_new_file, ensure_dir, timestamped};
use crate::utils::error::StorageError;

/// Silver layer: intermediate frames for inspection. No schema checks.
pub struct StagingWriter {
    base_dir: PathBuf,
}

impl StagingWriter {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        Ok(Self {
            base_dir: ensure_dir(base_dir.as_ref())?,
        })
    }

    pub fn save(&self, name: &str, frame: &Frame) -> Result<PathBuf, StorageError> {
        let body = serde_json::to_string_pretty(&serde_json::json!({
            "columns": frame.columns(),
            "rows": frame.to_json(),
        }))?;

        let (path, mut file) = create_new_file(&self.base_dir, &timestamped(name), "json")?;
        file.write_all(body.as_bytes())?;

        tracing::debug!("Staged {} rows of '{}' at {}", frame.len(), name, path.display());
        Ok(path)
    }
}
