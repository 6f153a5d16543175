// src/source/mod.rs
pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::utils::error::SourceError;
pub use models::{ExchangeRows, RawFiling};

/// Where raw filings and exchange listings come from.
///
/// Implementations own pagination, rate limiting and retries; callers only
/// see the complete result of one extract call.
#[async_trait]
pub trait FilingSource: Send + Sync {
    /// Filings matching `query` filed between `start` and `end` (inclusive, YYYY-MM-DD).
    async fn fetch_insider_transactions(
        &self,
        query: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<RawFiling>, SourceError>;

    /// Listing rows for each exchange, in the order given.
    async fn fetch_exchange_mapping(&self, exchanges: &[String]) -> Result<Vec<ExchangeRows>, SourceError>;
}
