// src/storage/sqlite.rs
//! SQLite-backed staleness markers and load sink.
//!
//! Transactions are append-only behind a unique index on their business key,
//! so re-loading a batch inserts nothing new. The exchange mapping is upserted
//! by ticker.

use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info};

use crate::frame::{Frame, Row};
use crate::storage::{ensure_dir, LoadSink, StalenessStore};
use crate::transform::records::{TransactionRecord, MAPPING_COLUMNS, TRANSACTION_COLUMNS};
use crate::utils::error::StorageError;

pub const TRANSACTIONS_TABLE: &str = "insider_transactions";
pub const MAPPING_TABLE: &str = "exchange_mapping";

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS etl_state (
    table_name TEXT PRIMARY KEY,
    last_updated TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS insider_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filed_at TEXT NOT NULL,
    period_of_report TEXT NOT NULL,
    document_type TEXT,
    issuer_ticker TEXT,
    issuer_cik TEXT,
    issuer_name TEXT,
    reporter TEXT,
    reporter_cik TEXT,
    is_officer INTEGER,
    officer_title TEXT,
    is_director INTEGER,
    is_ten_percent_owner INTEGER,
    "table" TEXT,
    code TEXT,
    acquired_disposed TEXT,
    transaction_date TEXT,
    shares REAL,
    price_per_share REAL,
    total_value REAL,
    shares_owned_following REAL,
    is_10b5_1 INTEGER NOT NULL DEFAULT 0,
    loaded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_insider_transactions_period
    ON insider_transactions(period_of_report);

CREATE TABLE IF NOT EXISTS exchange_mapping (
    name TEXT,
    issuer_ticker TEXT PRIMARY KEY,
    cik TEXT,
    exchange TEXT,
    is_delisted INTEGER,
    category TEXT,
    sector TEXT,
    industry TEXT,
    sic_sector TEXT,
    sic_industry TEXT,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
) WITHOUT ROWID;
"#;

/// Unique index over the transaction business key. SQLite treats NULLs as
/// distinct in unique indexes, so each key part is indexed as `IFNULL(col, '')`.
fn business_key_index_sql() -> String {
    let parts: Vec<String> = TransactionRecord::KEY_COLUMNS
        .iter()
        .map(|c| format!("IFNULL({}, '')", quote(c)))
        .collect();
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_insider_transactions_key ON {} ({});",
        TRANSACTIONS_TABLE,
        parts.join(", ")
    )
}

fn apply_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(&business_key_index_sql())?;
    Ok(())
}

/// Columns stored as 0/1 integers and read back as booleans.
const BOOL_COLUMNS: &[&str] = &[
    "is_officer",
    "is_director",
    "is_ten_percent_owner",
    "is_10b5_1",
    "is_delisted",
];

fn table_columns(collection: &str) -> Result<&'static [&'static str], StorageError> {
    match collection {
        TRANSACTIONS_TABLE => Ok(TRANSACTION_COLUMNS),
        MAPPING_TABLE => Ok(MAPPING_COLUMNS),
        other => Err(StorageError::UnknownCollection(other.to_string())),
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(column: &str, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if BOOL_COLUMNS.contains(&column) => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

/// Frame columns that the target table knows about, in frame order.
fn writable_columns<'f>(collection: &str, frame: &'f Frame) -> Result<Vec<&'f str>, StorageError> {
    let known = table_columns(collection)?;
    Ok(frame
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| known.contains(c))
        .collect())
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        info!("Database ready at {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn write_rows(&self, sql: &str, columns: &[&str], frame: &Frame) -> Result<usize, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(sql)?;
            for row in frame.rows() {
                let values = columns.iter().map(|c| to_sql(row.get(*c).unwrap_or(&Value::Null)));
                written += stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn read_frame<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Frame, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut out = Vec::new();
        let mut rows = stmt.query(params)?;
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in names.iter().enumerate() {
                record.insert(name.clone(), from_sql(name, row.get_ref(i)?));
            }
            out.push(record);
        }
        Ok(Frame::with_columns(names, out))
    }

    /// Stored transactions whose period of report falls within `[start, end]`.
    pub fn transactions_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Frame, StorageError> {
        let columns: Vec<String> = TRANSACTION_COLUMNS.iter().map(|c| quote(c)).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE period_of_report >= ?1 AND period_of_report < ?2 ORDER BY filed_at DESC",
            columns.join(", "),
            TRANSACTIONS_TABLE
        );
        let upper = end.succ_opt().unwrap_or(end).format("%Y-%m-%d").to_string();
        let lower = start.format("%Y-%m-%d").to_string();
        self.read_frame(&sql, params![lower, upper])
    }

    /// The whole exchange-mapping table.
    pub fn exchange_mapping(&self) -> Result<Frame, StorageError> {
        let columns: Vec<String> = MAPPING_COLUMNS.iter().map(|c| quote(c)).collect();
        let sql = format!("SELECT {} FROM {} ORDER BY issuer_ticker", columns.join(", "), MAPPING_TABLE);
        self.read_frame(&sql, [])
    }

    pub fn count(&self, collection: &str) -> Result<usize, StorageError> {
        table_columns(collection)?;
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", quote(collection)), [], |r| r.get(0))?;
        Ok(n as usize)
    }
}

impl StalenessStore for SqliteStore {
    fn last_updated(&self, dataset: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT last_updated FROM etl_state WHERE table_name = ?1",
                params![dataset],
                |r| r.get(0),
            )
            .optional()?;

        match raw {
            None => Ok(None),
            Some(text) => DateTime::parse_from_rfc3339(&text)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(|e| {
                    StorageError::SerializationError(format!("bad last_updated '{}' for {}: {}", text, dataset, e))
                }),
        }
    }

    fn set_last_updated(&self, dataset: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO etl_state (table_name, last_updated) VALUES (?1, ?2)
             ON CONFLICT(table_name) DO UPDATE SET last_updated = excluded.last_updated",
            params![dataset, at.to_rfc3339_opts(SecondsFormat::AutoSi, true)],
        )?;
        debug!("Marked {} as updated at {}", dataset, at);
        Ok(())
    }
}

impl LoadSink for SqliteStore {
    fn upsert(&self, collection: &str, rows: &Frame, key: &[&str]) -> Result<usize, StorageError> {
        let columns = writable_columns(collection, rows)?;
        if let Some(missing) = key.iter().find(|k| !columns.contains(*k)) {
            return Err(StorageError::SchemaMismatch {
                dataset: collection.to_string(),
                expected: key.iter().map(|k| k.to_string()).collect(),
                missing: vec![missing.to_string()],
            });
        }

        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !key.contains(*c))
            .map(|c| format!("{0} = excluded.{0}", quote(c)))
            .collect();
        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
            quote(collection),
            columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            (1..=columns.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", "),
            key.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            conflict
        );

        let written = self.write_rows(&sql, &columns, rows)?;
        info!("Upserted {} rows into {}", written, collection);
        Ok(written)
    }

    fn insert_many(&self, collection: &str, rows: &Frame) -> Result<usize, StorageError> {
        let columns = writable_columns(collection, rows)?;
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            quote(collection),
            columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            (1..=columns.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
        );

        let inserted = self.write_rows(&sql, &columns, rows)?;
        info!(
            "Inserted {} of {} rows into {} ({} already present)",
            inserted,
            rows.len(),
            collection,
            rows.len() - inserted
        );
        Ok(inserted)
    }
}
