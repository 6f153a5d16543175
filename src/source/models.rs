// src/source/models.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One SEC ownership filing (Form 3/4/5) exactly as the API returned it.
/// The shape varies across filings, so it stays an untyped document.
pub type RawFiling = Value;

/// Raw exchange-mapping rows fetched for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRows {
    pub exchange: String,
    pub rows: Vec<Value>,
}

/// Body of an insider-trading search request.
/// Example:
/// `{"query": {"query_string": {"query": "issuer.tradingSymbol:TSLA AND filedAt:[2024-01-01 TO 2024-01-31]"}},
///   "from": "0", "size": "50", "sort": [{"filedAt": {"order": "desc"}}]}`
#[derive(Debug, Clone, Serialize)]
pub struct InsiderSearchRequest {
    pub query: SearchQuery,
    // The API expects these two as strings.
    pub from: String,
    pub size: String,
    pub sort: Vec<SortClause>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    pub query_string: QueryString,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryString {
    pub query: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SortClause {
    #[serde(rename = "filedAt")]
    pub filed_at: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct SortOrder {
    pub order: String,
}

impl InsiderSearchRequest {
    /// Builds one page request restricted to filings filed in `[start, end]` (YYYY-MM-DD).
    pub fn page(query: &str, start: &str, end: &str, from: usize, size: usize) -> Self {
        Self {
            query: SearchQuery {
                query_string: QueryString {
                    query: format!("({}) AND filedAt:[{} TO {}]", query, start, end),
                },
            },
            from: from.to_string(),
            size: size.to_string(),
            sort: vec![SortClause {
                filed_at: SortOrder {
                    order: "desc".to_string(),
                },
            }],
        }
    }
}

/// Response of the insider-trading search endpoint.
#[derive(Debug, Deserialize)]
pub struct InsiderSearchResponse {
    #[serde(default)]
    pub total: Option<Value>,
    #[serde(default)]
    pub transactions: Vec<RawFiling>,
}
