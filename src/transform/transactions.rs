// src/transform/transactions.rs
use crate::config::{TransformPolicy, ValidationRules};
use crate::frame::Frame;
use crate::source::RawFiling;
use crate::storage::StagingWriter;
use crate::transform::clean::FieldCleaner;
use crate::transform::dedupe::dedupe;
use crate::transform::normalize::normalize;
use crate::transform::records::TransactionRecord;
use crate::transform::validate::Validator;
use crate::utils::error::StorageError;

/// Normalize → clean → dedupe → validate for insider transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionTransformer {
    cleaner: FieldCleaner,
    validator: Validator,
}

impl TransactionTransformer {
    pub fn new(policy: TransformPolicy, rules: ValidationRules) -> Self {
        Self {
            cleaner: FieldCleaner::new(policy),
            validator: Validator::new(rules),
        }
    }

    /// Runs every step, writing each intermediate result when `staging` is set.
    pub fn transform(
        &self,
        raw: &[RawFiling],
        staging: Option<&StagingWriter>,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        let normalized = normalize(raw);
        if let Some(writer) = staging {
            writer.save("insider_normalized", &normalized)?;
        }

        let cleaned = self.cleaner.clean(&normalized);
        if let Some(writer) = staging {
            writer.save("insider_cleaned", &Frame::from_records(&cleaned)?)?;
        }

        let deduped = dedupe(cleaned);
        if let Some(writer) = staging {
            writer.save("insider_deduped", &Frame::from_records(&deduped)?)?;
        }

        let validated = self.validator.validate(deduped);
        if let Some(writer) = staging {
            writer.save("insider_validated", &Frame::from_records(&validated)?)?;
        }

        tracing::info!(
            "Insider transactions: {} filings -> {} line-items -> {} valid records",
            raw.len(),
            normalized.len(),
            validated.len()
        );
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn filing(ticker: &str, items: Vec<Value>) -> Value {
        json!({
            "filedAt": "2024-06-03T18:30:00-04:00",
            "periodOfReport": "2024-05-31",
            "documentType": "4",
            "issuer": {"tradingSymbol": ticker, "cik": "320193", "name": "Issuer"},
            "reportingOwner": {"name": "Insider One", "cik": "111", "relationship": {"isDirector": true}},
            "nonDerivativeTable": {"transactions": items},
            "footnotes": [{"id": "F1", "text": "Effected pursuant to a Rule 10b5-1 trading plan."}]
        })
    }

    fn item(code: &str, date: &str, shares: f64, price: f64) -> Value {
        json!({
            "transactionDate": date,
            "coding": {"code": code},
            "amounts": {"shares": shares, "pricePerShare": price, "acquiredDisposedCode": "D"}
        })
    }

    #[test]
    fn end_to_end_filters_duplicates_and_rule_breakers() {
        let raw = vec![
            filing(
                "AAPL",
                vec![
                    item("S", "2024-05-30", 500.0, 190.0),
                    item("S", "2024-05-30", 250.0, 191.0), // same business key
                    item("M", "2024-05-29", 1000.0, 0.0),
                    item("S", "2024-05-31", 30.0, 30.0),
                ],
            ),
            filing("NONE", vec![item("P", "2024-05-28", 10.0, 5.0)]),
        ];

        let records = TransactionTransformer::default().transform(&raw, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shares, Some(500.0));
        assert_eq!(records[0].total_value, Some(95000.0));
        assert!(records[0].is_10b5_1);
        assert_eq!(records[0].is_director, Some(true));
    }

    #[test]
    fn empty_batch_is_not_an_error() {
        let records = TransactionTransformer::default().transform(&[], None).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn staging_receives_all_four_steps() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingWriter::new(dir.path()).unwrap();
        TransactionTransformer::default()
            .transform(&[filing("AAPL", vec![item("S", "2024-05-30", 5.0, 10.0)])], Some(&staging))
            .unwrap();
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 4);
        assert!(names[0].starts_with("insider_cleaned_"));
    }
}
