// src/frame.rs
//! Minimal column-ordered table used between pipeline stages and writers.
//!
//! Rows are JSON objects so a frame can carry loosely-typed normalizer output
//! as well as serialized typed records. The column list is kept separately so
//! an empty frame still knows its schema.

use serde::Serialize;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// Canonical, ordered column list of a typed record.
pub trait Schema {
    const COLUMNS: &'static [&'static str];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Frame {
    /// Empty frame with the given columns.
    pub fn empty(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a frame with an explicit column list. Keys missing from a row read as null.
    pub fn with_columns(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Builds a frame whose columns are the union of the row keys, in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    /// Serializes typed records into a frame carrying `T::COLUMNS`.
    pub fn from_records<T: Serialize + Schema>(records: &[T]) -> Result<Self, serde_json::Error> {
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::to_value(record)? {
                Value::Object(map) => rows.push(map),
                other => {
                    return Err(serde::ser::Error::custom(format!(
                        "record serialized to non-object value: {}",
                        other
                    )))
                }
            }
        }
        Ok(Self::with_columns(
            T::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        ))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Value at `row`/`column`; absent keys read as null.
    pub fn value(&self, row: usize, column: &str) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&Value::Null)
    }

    /// Projects the frame onto `columns`, in that order. Columns not in the
    /// list are dropped, columns missing from a row are filled with null.
    pub fn select(&self, columns: &[&str]) -> Frame {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
                    .collect::<Row>()
            })
            .collect();
        Frame::with_columns(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    /// JSON array of row objects, used for staging artifacts.
    pub fn to_json(&self) -> Value {
        Value::Array(self.rows.iter().cloned().map(Value::Object).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Pair {
        left: i64,
        right: Option<String>,
    }

    impl Schema for Pair {
        const COLUMNS: &'static [&'static str] = &["left", "right"];
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_records_keep_schema() {
        let frame = Frame::from_records::<Pair>(&[]).unwrap();
        assert_eq!(frame.columns(), &["left", "right"]);
        assert!(frame.is_empty());
    }

    #[test]
    fn from_rows_collects_columns_in_first_seen_order() {
        let frame = Frame::from_rows(vec![row(json!({"b": 1})), row(json!({"a": 2, "b": 3}))]);
        assert_eq!(frame.columns(), &["b", "a"]);
        assert_eq!(frame.value(0, "a"), &Value::Null);
    }

    #[test]
    fn select_reorders_and_fills_nulls() {
        let frame = Frame::from_records(&[Pair { left: 1, right: None }]).unwrap();
        let projected = frame.select(&["right", "extra", "left"]);
        assert_eq!(projected.columns(), &["right", "extra", "left"]);
        let keys: Vec<&String> = projected.rows()[0].keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(projected.value(0, "left"), &json!(1));
        assert_eq!(projected.value(0, "extra"), &Value::Null);
    }
}
