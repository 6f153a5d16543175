// src/transform/validate.rs
use crate::config::ValidationRules;
use crate::transform::records::TransactionRecord;

/// Why a record was rejected; used for debug counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    SharesEqualPrice,
    ImplausiblePrice,
    NonPositiveValue,
    ExcludedCode,
    ExcludedTicker,
    DeniedIssuer,
}

/// Business-rule filter over cleaned transactions.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    /// First rule `record` breaks, if any.
    pub fn check(&self, record: &TransactionRecord) -> Option<Rejection> {
        let rules = &self.rules;

        // Transposed or duplicated share/price entries.
        if let (Some(shares), Some(price)) = (record.shares, record.price_per_share) {
            if shares == price {
                return Some(Rejection::SharesEqualPrice);
            }
        }

        let price_ok = record.price_per_share.is_some_and(|p| p < rules.max_price_per_share);
        let single_share = record.shares == Some(1.0);
        if !(price_ok || single_share) {
            return Some(Rejection::ImplausiblePrice);
        }

        if !record.total_value.is_some_and(|v| v > 0.0) {
            return Some(Rejection::NonPositiveValue);
        }

        if record.code.as_ref().is_some_and(|c| rules.excluded_codes.contains(c)) {
            return Some(Rejection::ExcludedCode);
        }

        if record
            .issuer_ticker
            .as_ref()
            .is_some_and(|t| rules.excluded_tickers.contains(t))
        {
            return Some(Rejection::ExcludedTicker);
        }

        let cik = record
            .issuer_cik
            .as_deref()
            .and_then(|c| c.trim().parse::<u64>().ok());
        if cik.is_some_and(|c| rules.denied_issuer_ciks.contains(&c)) {
            return Some(Rejection::DeniedIssuer);
        }

        None
    }

    pub fn validate(&self, records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
        let before = records.len();
        let mut rejected: Vec<(Rejection, usize)> = Vec::new();

        let kept: Vec<TransactionRecord> = records
            .into_iter()
            .filter(|record| match self.check(record) {
                None => true,
                Some(reason) => {
                    match rejected.iter_mut().find(|(r, _)| *r == reason) {
                        Some((_, count)) => *count += 1,
                        None => rejected.push((reason, 1)),
                    }
                    false
                }
            })
            .collect();

        tracing::debug!("Validation kept {} of {} records; rejected: {:?}", kept.len(), before, rejected);
        kept
    }
}
