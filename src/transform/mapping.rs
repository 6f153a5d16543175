// src/transform/mapping.rs
use serde_json::Value;

use crate::config::TransformPolicy;
use crate::frame::{Frame, Row};
use crate::source::ExchangeRows;
use crate::storage::StagingWriter;
use crate::transform::dedupe::dedupe_by;
use crate::transform::document::{as_bool, as_text, Document};
use crate::transform::records::{ExchangeMappingRecord, MAPPING_COLUMNS};
use crate::utils::error::StorageError;

/// Source columns with a different canonical name.
const RENAME_COLUMNS: &[(&str, &str)] = &[
    ("ticker", "issuer_ticker"),
    ("isDelisted", "is_delisted"),
    ("sicSector", "sic_sector"),
    ("sicIndustry", "sic_industry"),
];

/// Source columns the mapping table does not keep.
const DROP_COLUMNS: &[&str] = &["cusip", "sic", "famaSector", "famaIndustry", "id", "currency", "location"];

/// Lower rank wins when a ticker is listed on several exchanges.
pub fn exchange_priority(exchange: Option<&str>) -> u8 {
    match exchange.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
        Some("nasdaq") => 0,
        Some("nyse") => 1,
        _ => 2,
    }
}

/// Exchange-Mapping Normalizer: raw listing rows to one record per ticker.
#[derive(Debug, Clone, Default)]
pub struct MappingTransformer {
    policy: TransformPolicy,
}

impl MappingTransformer {
    pub fn new(policy: TransformPolicy) -> Self {
        Self { policy }
    }

    /// Renames and drops source fields; rows that are not objects are skipped.
    /// A row without its own `exchange` inherits the exchange it was fetched for.
    pub fn normalize(&self, raw: &[ExchangeRows]) -> Frame {
        let mut rows = Vec::new();
        for batch in raw {
            for value in &batch.rows {
                let Value::Object(source) = value else {
                    continue;
                };
                let mut row = Row::new();
                for (key, v) in source {
                    if DROP_COLUMNS.contains(&key.as_str()) {
                        continue;
                    }
                    let name = RENAME_COLUMNS
                        .iter()
                        .find(|(from, _)| *from == key.as_str())
                        .map(|(_, to)| to.to_string())
                        .unwrap_or_else(|| key.clone());
                    row.insert(name, v.clone());
                }
                if row.get("exchange").map_or(true, Value::is_null) {
                    row.insert("exchange".to_string(), Value::String(batch.exchange.clone()));
                }
                rows.push(row);
            }
        }
        Frame::from_rows(rows)
    }

    /// Typed records in canonical shape; rows without a ticker are dropped,
    /// as are delisted rows when the policy says so. Only an explicit
    /// `is_delisted: true` drops a row; an unknown status keeps it.
    pub fn clean(&self, frame: &Frame) -> Vec<ExchangeMappingRecord> {
        frame
            .rows()
            .iter()
            .filter_map(|row| {
                let value = Value::Object(row.clone());
                let doc = Document::new(&value);
                let text = |column: &str| as_text(&doc.field(&[column]));

                let issuer_ticker = text("issuer_ticker")?;
                let is_delisted = as_bool(&doc.field(&["is_delisted"]));
                if self.policy.drop_delisted && is_delisted == Some(true) {
                    return None;
                }

                Some(ExchangeMappingRecord {
                    name: text("name"),
                    issuer_ticker,
                    cik: text("cik"),
                    exchange: text("exchange"),
                    is_delisted,
                    category: text("category"),
                    sector: text("sector"),
                    industry: text("industry"),
                    sic_sector: text("sic_sector"),
                    sic_industry: text("sic_industry"),
                })
            })
            .collect()
    }

    /// One row per ticker, NASDAQ before NYSE before anything else,
    /// independent of the order exchanges were fetched in.
    pub fn dedupe(&self, mut records: Vec<ExchangeMappingRecord>) -> Vec<ExchangeMappingRecord> {
        // sort_by_key is stable, so ties keep their input order
        records.sort_by_key(|r| exchange_priority(r.exchange.as_deref()));
        dedupe_by(records, |r| r.issuer_ticker.clone())
    }

    /// Full normalize → clean → dedupe pass, optionally persisting each step.
    pub fn transform(
        &self,
        raw: &[ExchangeRows],
        staging: Option<&StagingWriter>,
    ) -> Result<Vec<ExchangeMappingRecord>, StorageError> {
        let normalized = self.normalize(raw);
        if let Some(writer) = staging {
            writer.save("exchange_mapping_normalized", &normalized)?;
        }

        let cleaned = self.clean(&normalized);
        if let Some(writer) = staging {
            writer.save("exchange_mapping_cleaned", &Frame::from_records(&cleaned)?)?;
        }

        let deduped = self.dedupe(cleaned);
        if let Some(writer) = staging {
            writer.save("exchange_mapping_deduped", &Frame::from_records(&deduped)?)?;
        }

        tracing::info!(
            "Exchange mapping: {} raw rows -> {} unique tickers",
            normalized.len(),
            deduped.len()
        );
        Ok(deduped)
    }
}

/// Canonical frame of mapping records; empty input still carries every column.
pub fn mapping_frame(records: &[ExchangeMappingRecord]) -> Result<Frame, StorageError> {
    let frame = Frame::from_records(records)?;
    debug_assert_eq!(frame.columns(), MAPPING_COLUMNS);
    Ok(frame)
}
