// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 400 Bad Request

    #[error("API rate limit exceeded")]
    RateLimited,

    #[error("API rejected the credentials (HTTP {0})")]
    Unauthorized(reqwest::StatusCode),

    #[error("Failed to parse API response: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("File already exists: {0}")]
    FileExists(String),

    #[error("Schema mismatch for '{dataset}': missing columns {missing:?} (expected {expected:?})")]
    SchemaMismatch {
        dataset: String,
        expected: Vec<String>,
        missing: Vec<String>,
    },

    #[error("Type mismatch for '{dataset}': column '{column}' expected {expected}, row {row} holds {found}")]
    TypeMismatch {
        dataset: String,
        column: String,
        expected: String,
        row: usize,
        found: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Failure of one dataset refresh. The orchestrator catches these per task.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Extract failed: {0}")]
    Extract(#[from] SourceError),

    #[error("Persist/load failed: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Filing source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
