// src/transform/normalize.rs
//! Flattens raw filings into one row per transaction line-item.

use serde_json::{json, Value};

use crate::frame::{Frame, Row};
use crate::source::RawFiling;
use crate::transform::document::{as_f64, Document};
use crate::transform::records::TRANSACTION_COLUMNS;

/// Sub-tables holding line-items, with the label each row is tagged with.
const TABLES: [(&str, &str); 2] = [
    ("nonDerivativeTable", "non-derivative"),
    ("derivativeTable", "derivative"),
];

/// Footnote markers of a Rule 10b5-1 trading plan (second one uses an en dash).
const PLAN_MARKERS: [&str; 3] = ["10b5-1", "10b5\u{2013}1", "Rule 10b5"];

/// Joins the `text` of every footnote object with newlines.
fn footnotes_text(footnotes: &[Value]) -> String {
    footnotes
        .iter()
        .filter_map(|f| f.as_object())
        .filter_map(|f| f.get("text"))
        .map(|t| t.as_str().map(str::to_string).unwrap_or_else(|| t.to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn mentions_10b5_1_plan(text: &str) -> bool {
    PLAN_MARKERS.iter().any(|marker| text.contains(marker))
}

fn number_or_null(value: Option<f64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

/// Rows contributed by a single filing; zero when it has no line-items.
pub fn normalize_filing(filing: &RawFiling) -> Vec<Row> {
    let doc = Document::new(filing);
    let issuer = doc.section("issuer");
    let owner = doc.section("reportingOwner");
    let relationship = owner.section("relationship");

    let filed_at = doc.field(&["filedAt", "filed_at"]);
    let period = doc.field(&["periodOfReport", "period_of_report"]);
    let document_type = doc.field(&["documentType", "document_type"]);
    let is_10b5_1 = mentions_10b5_1_plan(&footnotes_text(doc.list("footnotes")));

    let mut rows = Vec::new();
    for (table_key, label) in TABLES {
        for item in doc.section(table_key).list("transactions") {
            let line = Document::new(item);
            let coding = line.section("coding");
            let amounts = line.section("amounts");
            let post = line.section("postTransactionAmounts");

            let shares = amounts.number(&["shares"]);
            let price = amounts.number(&["pricePerShare", "price_per_share"]);
            let total_value = match (shares, price) {
                (Some(s), Some(p)) => Some(s * p),
                _ => None,
            };

            let row = json!({
                "filed_at": filed_at,
                "period_of_report": period,
                "document_type": document_type,
                "issuer_ticker": issuer.field(&["tradingSymbol"]),
                "issuer_cik": issuer.field(&["cik"]),
                "issuer_name": issuer.field(&["name"]),
                "reporter": owner.field(&["name"]),
                "reporter_cik": owner.field(&["cik"]),
                "is_officer": relationship.field(&["isOfficer", "is_officer"]),
                "officer_title": relationship.field(&["officerTitle", "officer_title"]),
                "is_director": relationship.field(&["isDirector", "is_director"]),
                "is_ten_percent_owner": relationship.field(&["isTenPercentOwner", "is_ten_percent_owner"]),
                "table": label,
                "code": coding.field(&["code"]),
                "acquired_disposed": amounts.field(&["acquiredDisposedCode", "acquired_disposed"]),
                "transaction_date": line.field(&["transactionDate", "transaction_date"]),
                "shares": number_or_null(shares),
                "price_per_share": number_or_null(price),
                "total_value": number_or_null(total_value),
                "shares_owned_following": number_or_null(as_f64(&post.field(&["sharesOwnedFollowingTransaction"]))),
                "is_10b5_1": is_10b5_1,
            });
            if let Value::Object(map) = row {
                rows.push(map);
            }
        }
    }
    rows
}

/// Flattens every filing into a frame carrying the canonical transaction columns.
pub fn normalize(filings: &[RawFiling]) -> Frame {
    let rows: Vec<Row> = filings.iter().flat_map(normalize_filing).collect();
    tracing::debug!("Normalized {} filings into {} rows", filings.len(), rows.len());
    Frame::with_columns(TRANSACTION_COLUMNS.iter().map(|c| c.to_string()).collect(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(code: &str, shares: Value, price: Value) -> Value {
        json!({
            "transactionDate": "2024-03-01",
            "coding": {"code": code},
            "amounts": {"shares": shares, "pricePerShare": price, "acquiredDisposedCode": "D"},
            "postTransactionAmounts": {"sharesOwnedFollowingTransaction": 5000}
        })
    }

    fn filing(non_derivative: Vec<Value>, derivative: Vec<Value>, footnotes: Value) -> Value {
        json!({
            "filedAt": "2024-03-04T16:05:00-05:00",
            "periodOfReport": "2024-03-01",
            "documentType": "4",
            "issuer": {"tradingSymbol": "TSLA", "cik": "1318605", "name": "Tesla, Inc."},
            "reportingOwner": {
                "name": "Doe Jane",
                "cik": "0001",
                "relationship": {"isOfficer": true, "officerTitle": "CFO", "isDirector": false, "isTenPercentOwner": false}
            },
            "nonDerivativeTable": {"transactions": non_derivative},
            "derivativeTable": {"transactions": derivative},
            "footnotes": footnotes
        })
    }

    #[test]
    fn empty_input_yields_empty_frame_with_schema() {
        let frame = normalize(&[]);
        assert!(frame.is_empty());
        assert_eq!(frame.columns().len(), TRANSACTION_COLUMNS.len());
    }

    #[test]
    fn one_row_per_line_item_across_both_tables() {
        let f = filing(
            vec![line("S", json!(10), json!(2)), line("P", json!(20), json!(3))],
            vec![line("A", json!(1), json!(0.5))],
            Value::Null,
        );
        let frame = normalize(&[f]);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.value(0, "table"), &json!("non-derivative"));
        assert_eq!(frame.value(2, "table"), &json!("derivative"));
        assert_eq!(frame.value(0, "issuer_ticker"), &json!("TSLA"));
        assert_eq!(frame.value(0, "officer_title"), &json!("CFO"));
        assert_eq!(frame.value(0, "shares_owned_following"), &json!(5000.0));
    }

    #[test]
    fn filing_without_line_items_contributes_nothing() {
        let bare = json!({"filedAt": "2024-01-01", "issuer": {"tradingSymbol": "X"}});
        assert_eq!(normalize(&[bare, filing(vec![], vec![], Value::Null)]).len(), 0);
    }

    #[test]
    fn total_value_is_shares_times_price() {
        let frame = normalize(&[filing(vec![line("S", json!(1000), json!(150))], vec![], Value::Null)]);
        assert_eq!(frame.value(0, "total_value").as_f64(), Some(150000.0));
    }

    #[test]
    fn non_numeric_shares_become_null_without_failing() {
        let frame = normalize(&[filing(vec![line("S", json!("invalid"), json!(150))], vec![], Value::Null)]);
        assert_eq!(frame.value(0, "shares"), &Value::Null);
        assert_eq!(frame.value(0, "total_value"), &Value::Null);
        assert_eq!(frame.value(0, "price_per_share").as_f64(), Some(150.0));
    }

    #[test]
    fn detects_10b5_1_plan_in_footnotes() {
        let notes = json!([{"id": "F1", "text": "Sold under a Rule 10b5-1 plan in place since 2023."}]);
        let frame = normalize(&[filing(vec![line("S", json!(1), json!(2))], vec![], notes)]);
        assert_eq!(frame.value(0, "is_10b5_1"), &json!(true));

        let frame = normalize(&[filing(vec![line("S", json!(1), json!(2))], vec![], Value::Null)]);
        assert_eq!(frame.value(0, "is_10b5_1"), &json!(false));
    }

    #[test]
    fn plan_markers_are_case_sensitive_and_accept_en_dash() {
        assert!(mentions_10b5_1_plan("adopted a 10b5\u{2013}1 plan"));
        assert!(!mentions_10b5_1_plan("RULE 10B5-1"));
    }

    #[test]
    fn footnotes_that_are_not_objects_are_ignored() {
        let notes = vec![json!("10b5-1"), json!({"id": "F2"}), json!({"text": "plain"})];
        assert_eq!(footnotes_text(&notes), "plain");
    }

    #[test]
    fn missing_sub_objects_yield_nulls() {
        let f = json!({"nonDerivativeTable": {"transactions": [{}]}, "reportingOwner": null});
        let frame = normalize(&[f]);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.value(0, "reporter"), &Value::Null);
        assert_eq!(frame.value(0, "code"), &Value::Null);
        assert_eq!(frame.value(0, "total_value"), &Value::Null);
    }
}
