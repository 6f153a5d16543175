// src/transform/clean.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::config::TransformPolicy;
use crate::frame::{Frame, Row};
use crate::transform::document::{as_bool, as_f64, as_text};
use crate::transform::records::TransactionRecord;

/// API-style field names and the canonical column each one maps to.
const RENAME_COLUMNS: &[(&str, &str)] = &[
    ("filedAt", "filed_at"),
    ("periodOfReport", "period_of_report"),
    ("documentType", "document_type"),
    ("issuerTicker", "issuer_ticker"),
    ("issuerCik", "issuer_cik"),
    ("issuerName", "issuer_name"),
    ("reporterName", "reporter"),
    ("reporterCik", "reporter_cik"),
    ("isOfficer", "is_officer"),
    ("officerTitle", "officer_title"),
    ("isDirector", "is_director"),
    ("isTenPercentOwner", "is_ten_percent_owner"),
    ("acquiredDisposed", "acquired_disposed"),
    ("transactionDate", "transaction_date"),
    ("pricePerShare", "price_per_share"),
    ("totalValue", "total_value"),
    ("sharesOwnedFollowing", "shares_owned_following"),
    ("is10b5_1", "is_10b5_1"),
];

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a timestamp into UTC. Accepts RFC 3339 with any offset, naive
/// date-times (read as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Resolves `column` on a row, falling back to its API-style alias.
fn lookup<'r>(row: &'r Row, column: &str) -> &'r Value {
    if let Some(v) = row.get(column).filter(|v| !v.is_null()) {
        return v;
    }
    RENAME_COLUMNS
        .iter()
        .filter(|(_, canonical)| *canonical == column)
        .filter_map(|(alias, _)| row.get(*alias))
        .find(|v| !v.is_null())
        .unwrap_or(&Value::Null)
}

/// Field Cleaner: canonical names, typed values, unrecoverable rows dropped.
#[derive(Debug, Clone, Default)]
pub struct FieldCleaner {
    policy: TransformPolicy,
}

impl FieldCleaner {
    pub fn new(policy: TransformPolicy) -> Self {
        Self { policy }
    }

    /// Coerces one row. `None` when filed-at or period-of-report is unusable.
    pub fn clean_row(&self, row: &Row) -> Option<TransactionRecord> {
        let filed_at = parse_timestamp(lookup(row, "filed_at"))?;
        let period_of_report = parse_timestamp(lookup(row, "period_of_report"))?;

        let mut transaction_date = parse_timestamp(lookup(row, "transaction_date"));
        if transaction_date.is_none() && self.policy.backfill_transaction_date {
            transaction_date = Some(period_of_report);
        }

        let text = |column: &str| as_text(lookup(row, column));
        let flag = |column: &str| as_bool(lookup(row, column));
        let number = |column: &str| as_f64(lookup(row, column));

        Some(TransactionRecord {
            filed_at,
            period_of_report,
            document_type: text("document_type"),
            issuer_ticker: text("issuer_ticker"),
            issuer_cik: text("issuer_cik"),
            issuer_name: text("issuer_name"),
            reporter: text("reporter"),
            reporter_cik: text("reporter_cik"),
            is_officer: flag("is_officer"),
            officer_title: text("officer_title"),
            is_director: flag("is_director"),
            is_ten_percent_owner: flag("is_ten_percent_owner"),
            table: text("table"),
            code: text("code"),
            acquired_disposed: text("acquired_disposed"),
            transaction_date,
            shares: number("shares"),
            price_per_share: number("price_per_share"),
            total_value: number("total_value"),
            shares_owned_following: number("shares_owned_following"),
            is_10b5_1: flag("is_10b5_1").unwrap_or(false),
        })
    }

    pub fn clean(&self, frame: &Frame) -> Vec<TransactionRecord> {
        let records: Vec<TransactionRecord> = frame.rows().iter().filter_map(|row| self.clean_row(row)).collect();
        let dropped = frame.len() - records.len();
        if dropped > 0 {
            tracing::debug!("Dropped {} rows without a usable filed_at/period_of_report", dropped);
        }
        records
    }
}
