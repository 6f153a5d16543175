// src/pipeline/fakes.rs
//! In-memory collaborators for pipeline tests.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::frame::Frame;
use crate::source::{ExchangeRows, FilingSource, RawFiling};
use crate::storage::LoadSink;
use crate::utils::error::{SourceError, StorageError};

pub fn config_in(data_dir: &Path) -> AppConfig {
    let dir = data_dir.display().to_string();
    AppConfig::from_lookup(move |key| match key {
        "DATA_DIR" => Some(dir.clone()),
        _ => None,
    })
    .unwrap()
}

fn filing() -> Value {
    json!({
        "filedAt": "2024-06-03T18:30:00-04:00",
        "periodOfReport": "2024-05-31",
        "documentType": "4",
        "issuer": {"tradingSymbol": "AAPL", "cik": "320193", "name": "Apple Inc."},
        "reportingOwner": {"name": "Cook Timothy D", "cik": "1214156", "relationship": {"isOfficer": true}},
        "nonDerivativeTable": {"transactions": [{
            "transactionDate": "2024-05-30",
            "coding": {"code": "S"},
            "amounts": {"shares": 500.0, "pricePerShare": 190.0, "acquiredDisposedCode": "D"}
        }]}
    })
}

fn listing(ticker: &str, exchange: &str) -> Value {
    json!({"name": format!("{} Corp", ticker), "ticker": ticker, "cik": "320193", "exchange": exchange, "isDelisted": false})
}

#[derive(Default)]
pub struct FakeSource {
    pub fail: bool,
    mapping_calls: Mutex<usize>,
    insider_windows: Mutex<Vec<(String, String)>>,
}

impl FakeSource {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn mapping_calls(&self) -> usize {
        *self.mapping_calls.lock()
    }

    pub fn insider_calls(&self) -> usize {
        self.insider_windows.lock().len()
    }

    pub fn insider_windows(&self) -> Vec<(String, String)> {
        self.insider_windows.lock().clone()
    }
}

#[async_trait]
impl FilingSource for FakeSource {
    async fn fetch_insider_transactions(
        &self,
        _query: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<RawFiling>, SourceError> {
        self.insider_windows.lock().push((start.to_string(), end.to_string()));
        if self.fail {
            return Err(SourceError::RateLimited);
        }
        Ok(vec![filing()])
    }

    async fn fetch_exchange_mapping(&self, exchanges: &[String]) -> Result<Vec<ExchangeRows>, SourceError> {
        *self.mapping_calls.lock() += 1;
        if self.fail {
            return Err(SourceError::Parse("mapping payload was not an array".to_string()));
        }
        Ok(exchanges
            .iter()
            .map(|exchange| ExchangeRows {
                exchange: exchange.clone(),
                rows: match exchange.as_str() {
                    "nyse" => vec![listing("IBM", "NYSE"), listing("AAPL", "NYSE")],
                    _ => vec![listing("AAPL", "NASDAQ")],
                },
            })
            .collect())
    }
}

/// Records each load as `(collection, rows)`; optionally fails every load.
#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    loads: Mutex<Vec<(String, usize)>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn loads(&self) -> Vec<(String, usize)> {
        self.loads.lock().clone()
    }

    fn record(&self, collection: &str, rows: &Frame) -> Result<usize, StorageError> {
        if self.fail {
            return Err(StorageError::UnknownCollection(collection.to_string()));
        }
        self.loads.lock().push((collection.to_string(), rows.len()));
        Ok(rows.len())
    }
}

impl LoadSink for RecordingSink {
    fn upsert(&self, collection: &str, rows: &Frame, _key: &[&str]) -> Result<usize, StorageError> {
        self.record(collection, rows)
    }

    fn insert_many(&self, collection: &str, rows: &Frame) -> Result<usize, StorageError> {
        self.record(collection, rows)
    }
}
