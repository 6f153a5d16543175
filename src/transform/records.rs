// src/transform/records.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::Schema;

pub const TRANSACTION_COLUMNS: &[&str] = &[
    "filed_at",
    "period_of_report",
    "document_type",
    "issuer_ticker",
    "issuer_cik",
    "issuer_name",
    "reporter",
    "reporter_cik",
    "is_officer",
    "officer_title",
    "is_director",
    "is_ten_percent_owner",
    "table",
    "code",
    "acquired_disposed",
    "transaction_date",
    "shares",
    "price_per_share",
    "total_value",
    "shares_owned_following",
    "is_10b5_1",
];

pub const MAPPING_COLUMNS: &[&str] = &[
    "name",
    "issuer_ticker",
    "cik",
    "exchange",
    "is_delisted",
    "category",
    "sector",
    "industry",
    "sic_sector",
    "sic_industry",
];

/// One transaction line-item of a filing, after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub filed_at: DateTime<Utc>,
    pub period_of_report: DateTime<Utc>,
    pub document_type: Option<String>,
    pub issuer_ticker: Option<String>,
    pub issuer_cik: Option<String>,
    pub issuer_name: Option<String>,
    pub reporter: Option<String>,
    pub reporter_cik: Option<String>,
    pub is_officer: Option<bool>,
    pub officer_title: Option<String>,
    pub is_director: Option<bool>,
    pub is_ten_percent_owner: Option<bool>,
    /// `non-derivative` or `derivative`.
    pub table: Option<String>,
    pub code: Option<String>,
    /// `A` (acquired) or `D` (disposed).
    pub acquired_disposed: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub shares: Option<f64>,
    pub price_per_share: Option<f64>,
    pub total_value: Option<f64>,
    pub shares_owned_following: Option<f64>,
    pub is_10b5_1: bool,
}

impl Schema for TransactionRecord {
    const COLUMNS: &'static [&'static str] = TRANSACTION_COLUMNS;
}

/// Business key used for deduplication and for the storage unique index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub issuer_ticker: Option<String>,
    pub reporter: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub code: Option<String>,
}

impl TransactionRecord {
    pub const KEY_COLUMNS: &'static [&'static str] = &["issuer_ticker", "reporter", "transaction_date", "code"];

    pub fn key(&self) -> TransactionKey {
        TransactionKey {
            issuer_ticker: self.issuer_ticker.clone(),
            reporter: self.reporter.clone(),
            transaction_date: self.transaction_date,
            code: self.code.clone(),
        }
    }
}

/// Exchange listing metadata for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMappingRecord {
    pub name: Option<String>,
    pub issuer_ticker: String,
    pub cik: Option<String>,
    pub exchange: Option<String>,
    pub is_delisted: Option<bool>,
    pub category: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub sic_sector: Option<String>,
    pub sic_industry: Option<String>,
}

impl ExchangeMappingRecord {
    pub const KEY_COLUMNS: &'static [&'static str] = &["issuer_ticker"];
}

impl Schema for ExchangeMappingRecord {
    const COLUMNS: &'static [&'static str] = MAPPING_COLUMNS;
}
