// src/transform/dedupe.rs
use std::collections::HashSet;
use std::hash::Hash;

use crate::transform::records::TransactionRecord;

/// Keeps the first item per key, preserving input order.
pub fn dedupe_by<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

/// Removes repeated transactions by (issuer_ticker, reporter, transaction_date, code).
pub fn dedupe(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    let before = records.len();
    let out = dedupe_by(records, TransactionRecord::key);
    tracing::debug!("Dedupe removed {} of {} records", before - out.len(), before);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(reporter: &str, code: &str, shares: f64) -> TransactionRecord {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        TransactionRecord {
            filed_at: ts,
            period_of_report: ts,
            document_type: Some("4".into()),
            issuer_ticker: Some("MSFT".into()),
            issuer_cik: Some("789019".into()),
            issuer_name: None,
            reporter: Some(reporter.into()),
            reporter_cik: None,
            is_officer: None,
            officer_title: None,
            is_director: None,
            is_ten_percent_owner: None,
            table: Some("non-derivative".into()),
            code: Some(code.into()),
            acquired_disposed: Some("D".into()),
            transaction_date: Some(ts),
            shares: Some(shares),
            price_per_share: Some(10.0),
            total_value: Some(shares * 10.0),
            shares_owned_following: None,
            is_10b5_1: false,
        }
    }

    #[test]
    fn keeps_first_occurrence_per_business_key() {
        let out = dedupe(vec![
            record("A", "S", 1.0),
            record("B", "S", 2.0),
            record("A", "S", 3.0),
            record("A", "P", 4.0),
        ]);
        let shares: Vec<f64> = out.iter().filter_map(|r| r.shares).collect();
        assert_eq!(shares, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(dedupe(Vec::new()).is_empty());
    }
}
