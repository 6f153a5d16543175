// src/dataset.rs
//! Analysis export: stored transactions enriched with exchange metadata.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{TransformPolicy, ValidationRules};
use crate::frame::{Frame, Row};
use crate::storage::{ensure_dir, SqliteStore};
use crate::storage::final_layer::write_csv;
use crate::transform::records::{TransactionRecord, TRANSACTION_COLUMNS};
use crate::transform::{FieldCleaner, Validator};
use crate::utils::error::StorageError;

/// Prices at or above this are treated as data-entry errors.
pub const MAX_DATASET_PRICE: f64 = 100_000.0;

const LISTED_EXCHANGES: [&str; 2] = ["NASDAQ", "NYSE"];

/// Mapping columns appended to each transaction: (output column, mapping column).
const MAPPING_JOIN: &[(&str, &str)] = &[
    ("ticker_name", "name"),
    ("exchange", "exchange"),
    ("is_delisted", "is_delisted"),
    ("category", "category"),
    ("sector", "sector"),
    ("industry", "industry"),
    ("sic_sector", "sic_sector"),
    ("sic_industry", "sic_industry"),
];

static SINGLE_TICKER_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*issuer\.tradingSymbol:([A-Za-z0-9.\-]+)\s*$").expect("Failed to compile SINGLE_TICKER_QUERY")
});

/// Ticker named by a query of the form `issuer.tradingSymbol:XYZ`.
pub fn query_ticker(query: &str) -> Option<String> {
    SINGLE_TICKER_QUERY
        .captures(query)
        .map(|caps| caps[1].to_uppercase())
}

#[derive(Debug, Clone)]
pub struct DatasetRequest {
    pub query: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub output: PathBuf,
}

impl DatasetRequest {
    pub fn default_output(data_dir: &Path, start: NaiveDate, end: NaiveDate) -> PathBuf {
        data_dir.join(format!("insider_dataset_{}_{}.csv", start, end))
    }
}

pub struct DatasetBuilder {
    cleaner: FieldCleaner,
    validator: Validator,
}

impl DatasetBuilder {
    pub fn new(policy: TransformPolicy, rules: ValidationRules) -> Self {
        Self {
            cleaner: FieldCleaner::new(policy),
            validator: Validator::new(rules),
        }
    }

    /// Writes the enriched dataset to `request.output` and returns its row count.
    pub fn build(&self, store: &SqliteStore, request: &DatasetRequest) -> Result<usize, StorageError> {
        let stored = store.transactions_between(request.start, request.end)?;
        let records = self.validator.validate(self.cleaner.clean(&stored));
        debug!("{} stored rows, {} pass validation", stored.len(), records.len());

        let ticker = query_ticker(&request.query);
        let mapping = index_mapping(store.exchange_mapping()?, ticker.as_deref());
        let frame = assemble(records, &mapping)?;

        if let Some(parent) = request.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        write_csv(fs::File::create(&request.output)?, &frame)?;

        info!(
            "Wrote {} rows ({} to {}) to {}",
            frame.len(),
            request.start,
            request.end,
            request.output.display()
        );
        Ok(frame.len())
    }
}

fn index_mapping(mapping: Frame, only: Option<&str>) -> HashMap<String, Row> {
    mapping
        .into_rows()
        .into_iter()
        .filter_map(|row| {
            let ticker = row.get("issuer_ticker")?.as_str()?.to_string();
            match only {
                Some(wanted) if !ticker.eq_ignore_ascii_case(wanted) => None,
                _ => Some((ticker, row)),
            }
        })
        .collect()
}

fn is_listed(exchange: &Value) -> bool {
    exchange
        .as_str()
        .is_some_and(|e| LISTED_EXCHANGES.iter().any(|l| l.eq_ignore_ascii_case(e.trim())))
}

fn plausible_price(record: &TransactionRecord) -> bool {
    record
        .price_per_share
        .map_or(true, |p| p > 0.0 && p < MAX_DATASET_PRICE)
}

/// Join → listed-exchange filter → price filter → newest filings first.
fn assemble(mut records: Vec<TransactionRecord>, mapping: &HashMap<String, Row>) -> Result<Frame, StorageError> {
    records.retain(plausible_price);
    records.sort_by(|a, b| {
        b.filed_at
            .cmp(&a.filed_at)
            .then_with(|| a.issuer_ticker.cmp(&b.issuer_ticker))
    });

    let mut columns: Vec<String> = TRANSACTION_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(MAPPING_JOIN.iter().map(|(out, _)| out.to_string()));

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let listing = record.issuer_ticker.as_ref().and_then(|t| mapping.get(t));
        let Some(listing) = listing.filter(|l| l.get("exchange").is_some_and(is_listed)) else {
            continue;
        };

        let Value::Object(mut row) = serde_json::to_value(record)? else {
            continue;
        };
        for (out, source) in MAPPING_JOIN {
            row.insert(out.to_string(), listing.get(*source).cloned().unwrap_or(Value::Null));
        }
        rows.push(row);
    }
    Ok(Frame::with_columns(columns, rows))
}
