// src/storage/final_layer.rs
//! Gold layer. A dataset is written only when it carries every canonical
//! column and every typed column holds values of its declared type. Any
//! violation rejects the whole save before a file is created.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use serde_json::Value;

use crate::frame::Frame;
use crate::storage::{create_new_file, ensure_dir, timestamped};
use crate::transform::records::{MAPPING_COLUMNS, TRANSACTION_COLUMNS};
use crate::utils::error::StorageError;

/// Declared type of a final-layer column. Nulls always pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Float,
    Integer,
    Boolean,
    /// RFC 3339 string with a zero UTC offset.
    TimestampUtc,
}

impl ColumnType {
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Text, Value::String(_)) => true,
            (ColumnType::Float, Value::Number(_)) => true,
            (ColumnType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::TimestampUtc, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|ts| ts.offset().local_minus_utc() == 0)
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "text",
            ColumnType::Float => "float",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
            ColumnType::TimestampUtc => "UTC timestamp",
        };
        f.write_str(name)
    }
}

pub struct FinalWriter {
    base_dir: PathBuf,
    schema: Vec<String>,
    enforce_types: Vec<(String, ColumnType)>,
    keep_history: bool,
}

impl FinalWriter {
    pub fn new<P: AsRef<Path>>(
        base_dir: P,
        schema: &[&str],
        enforce_types: &[(&str, ColumnType)],
        keep_history: bool,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            base_dir: ensure_dir(base_dir.as_ref())?,
            schema: schema.iter().map(|c| c.to_string()).collect(),
            enforce_types: enforce_types.iter().map(|(c, t)| (c.to_string(), *t)).collect(),
            keep_history,
        })
    }

    /// Writer for the insider-transactions dataset.
    pub fn transactions<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        Self::new(
            base_dir,
            TRANSACTION_COLUMNS,
            &[
                ("filed_at", ColumnType::TimestampUtc),
                ("period_of_report", ColumnType::TimestampUtc),
                ("transaction_date", ColumnType::TimestampUtc),
                ("issuer_ticker", ColumnType::Text),
                ("code", ColumnType::Text),
                ("shares", ColumnType::Float),
                ("price_per_share", ColumnType::Float),
                ("total_value", ColumnType::Float),
                ("shares_owned_following", ColumnType::Float),
                ("is_10b5_1", ColumnType::Boolean),
            ],
            true,
        )
    }

    /// Writer for the exchange-mapping dataset.
    pub fn exchange_mapping<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        Self::new(
            base_dir,
            MAPPING_COLUMNS,
            &[
                ("issuer_ticker", ColumnType::Text),
                ("cik", ColumnType::Text),
                ("exchange", ColumnType::Text),
                ("is_delisted", ColumnType::Boolean),
            ],
            true,
        )
    }

    /// Validate → reorder → write CSV.
    pub fn save(&self, name: &str, frame: &Frame) -> Result<PathBuf, StorageError> {
        self.validate_schema(name, frame)?;
        self.validate_types(name, frame)?;

        let columns: Vec<&str> = self.schema.iter().map(String::as_str).collect();
        let ordered = frame.select(&columns);

        let stem = if self.keep_history {
            timestamped(name)
        } else {
            name.to_string()
        };

        // Write beside the target first so a failed write never leaves a partial dataset.
        let tmp = self.base_dir.join(format!(".{}.csv.tmp", stem));
        let written = fs::File::create(&tmp)
            .map_err(StorageError::IoError)
            .and_then(|file| write_csv(file, &ordered));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        let target = if self.keep_history {
            let (path, _placeholder) = create_new_file(&self.base_dir, &stem, "csv")?;
            path
        } else {
            self.base_dir.join(format!("{}.csv", stem))
        };
        fs::rename(&tmp, &target)?;

        tracing::info!("Saved final dataset '{}' ({} rows) to {}", name, ordered.len(), target.display());
        Ok(target)
    }

    /// Every canonical column must be present; extra columns are fine.
    fn validate_schema(&self, name: &str, frame: &Frame) -> Result<(), StorageError> {
        let mut missing: Vec<String> = Vec::new();
        for column in self.schema.iter().chain(self.enforce_types.iter().map(|(c, _)| c)) {
            if !frame.has_column(column) && !missing.contains(column) {
                missing.push(column.clone());
            }
        }

        if missing.is_empty() {
            return Ok(());
        }
        tracing::error!("Final dataset '{}' is missing columns {:?}", name, missing);
        Err(StorageError::SchemaMismatch {
            dataset: name.to_string(),
            expected: self.schema.clone(),
            missing,
        })
    }

    fn validate_types(&self, name: &str, frame: &Frame) -> Result<(), StorageError> {
        for (column, expected) in &self.enforce_types {
            for (index, _) in frame.rows().iter().enumerate() {
                let value = frame.value(index, column);
                if !expected.accepts(value) {
                    tracing::error!("Final dataset '{}': column '{}' row {} is not {}", name, column, index, expected);
                    return Err(StorageError::TypeMismatch {
                        dataset: name.to_string(),
                        column: column.clone(),
                        expected: expected.to_string(),
                        row: index,
                        found: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Writes `frame` as CSV in its own column order, header first.
pub(crate) fn write_csv<W: Write>(writer: W, frame: &Frame) -> Result<(), StorageError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(frame.columns())?;
    for index in 0..frame.len() {
        out.write_record(frame.columns().iter().map(|c| cell(frame.value(index, c))))?;
    }
    out.flush()?;
    Ok(())
}
