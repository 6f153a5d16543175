// src/source/client.rs
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde_json::Value;

use crate::config::ApiConfig;
use crate::source::models::{ExchangeRows, InsiderSearchRequest, InsiderSearchResponse, RawFiling};
use crate::source::FilingSource;
use crate::utils::error::SourceError;

const USER_AGENT: &str = concat!("insider_etl/", env!("CARGO_PKG_VERSION"));

/// How a non-success HTTP status is handled.
#[derive(Debug, PartialEq)]
enum StatusAction {
    Retry,
    Fail,
}

fn classify(status: StatusCode) -> StatusAction {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusAction::Retry
    } else {
        StatusAction::Fail
    }
}

fn status_error(status: StatusCode) -> SourceError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized(status),
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited,
        other => SourceError::Http(other),
    }
}

/// Outcome of one request attempt.
enum Attempt<T> {
    Done(T),
    Retryable(SourceError),
    Fatal(SourceError),
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Runs `attempt_once` until it succeeds, fails fatally, or has been
/// retried `max_retries` times.
async fn with_backoff<T, F, Fut>(
    what: &str,
    max_retries: u32,
    base_delay: Duration,
    mut attempt_once: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        let failure = match attempt_once().await {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(e) => return Err(e),
            Attempt::Retryable(e) if attempt >= max_retries => return Err(e),
            Attempt::Retryable(e) => e,
        };

        let backoff = backoff_delay(base_delay, attempt);
        tracing::warn!(
            "{} failed ({}); retrying in {:?} (attempt {}/{})",
            what,
            failure,
            backoff,
            attempt + 1,
            max_retries
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

/// Pages through a search by `from` offset until a short or empty page,
/// or until `max_pages` pages have been fetched.
async fn collect_pages<F, Fut>(
    page_size: usize,
    max_pages: usize,
    delay: Duration,
    mut fetch_page: F,
) -> Result<Vec<RawFiling>, SourceError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<RawFiling>, SourceError>>,
{
    let mut filings = Vec::new();
    let mut from = 0;

    for page in 0..max_pages {
        // --- Basic Rate Limiting ---
        if page > 0 {
            tokio::time::sleep(delay).await;
        }

        let batch = fetch_page(from).await?;
        let count = batch.len();
        tracing::debug!("Page {} (from={}) returned {} filings", page, from, count);

        if count == 0 {
            break;
        }
        filings.extend(batch);
        if count < page_size {
            break;
        }
        from += page_size;
    }

    Ok(filings)
}

/// Client for the sec-api.io insider-trading and exchange-mapping endpoints.
pub struct SecApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl SecApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn insider_url(&self) -> String {
        format!("{}/insider-trading", self.config.base_url)
    }

    fn mapping_url(&self, exchange: &str) -> String {
        format!("{}/mapping/exchange/{}", self.config.base_url, exchange)
    }

    /// Sends the request built by `build`, retrying transient failures
    /// (network errors, 429, 5xx) with exponential backoff.
    async fn send_with_retry<F>(&self, what: &str, build: F) -> Result<reqwest::Response, SourceError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let build = &build;
        with_backoff(what, self.config.max_retries, self.config.request_delay, || async move {
            match build().send().await {
                Ok(response) if response.status().is_success() => Attempt::Done(response),
                Ok(response) => {
                    let status = response.status();
                    tracing::warn!("HTTP error status {} for {}", status, what);
                    match classify(status) {
                        StatusAction::Retry => Attempt::Retryable(status_error(status)),
                        StatusAction::Fail => Attempt::Fatal(status_error(status)),
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                    Attempt::Retryable(SourceError::Network(e))
                }
                Err(e) => Attempt::Fatal(SourceError::Network(e)),
            }
        })
        .await
    }

    async fn search_page(&self, request: &InsiderSearchRequest) -> Result<InsiderSearchResponse, SourceError> {
        let url = self.insider_url();
        let response = self
            .send_with_retry("insider-trading search", || {
                self.http
                    .post(&url)
                    .query(&[("token", self.config.api_key.as_str())])
                    .header(header::ACCEPT, "application/json")
                    .json(request)
            })
            .await?;

        let body = response.text().await?;
        parse_search_response(&body)
    }
}

fn parse_search_response(body: &str) -> Result<InsiderSearchResponse, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Parse(format!("insider-trading response: {}", e)))
}

fn parse_mapping_response(exchange: &str, body: &str) -> Result<Vec<Value>, SourceError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(rows)) => Ok(rows),
        Ok(other) => Err(SourceError::Parse(format!(
            "mapping response for {} is not an array (got {})",
            exchange,
            json_kind(&other)
        ))),
        Err(e) => Err(SourceError::Parse(format!("mapping response for {}: {}", exchange, e))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl FilingSource for SecApiClient {
    async fn fetch_insider_transactions(
        &self,
        query: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<RawFiling>, SourceError> {
        tracing::info!("Fetching insider transactions for '{}' filed {} to {}", query, start, end);

        let size = self.config.page_size;
        let filings = collect_pages(size, self.config.max_pages, self.config.request_delay, |from| {
            let request = InsiderSearchRequest::page(query, start, end, from, size);
            async move {
                let response = self.search_page(&request).await?;
                tracing::debug!("Search from={} reported total {:?}", from, response.total);
                Ok::<_, SourceError>(response.transactions)
            }
        })
        .await?;

        tracing::info!("Fetched {} filings", filings.len());
        Ok(filings)
    }

    async fn fetch_exchange_mapping(&self, exchanges: &[String]) -> Result<Vec<ExchangeRows>, SourceError> {
        let mut out = Vec::with_capacity(exchanges.len());

        for (i, exchange) in exchanges.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.request_delay).await;
            }

            let url = self.mapping_url(exchange);
            tracing::info!("Fetching exchange mapping for {}", exchange);
            let response = self
                .send_with_retry("exchange mapping", || {
                    self.http
                        .get(&url)
                        .query(&[("token", self.config.api_key.as_str())])
                        .header(header::ACCEPT, "application/json")
                })
                .await?;

            let body = response.text().await?;
            let rows = parse_mapping_response(exchange, &body)?;
            tracing::debug!("{} mapping rows for {}", rows.len(), exchange);
            out.push(ExchangeRows {
                exchange: exchange.clone(),
                rows,
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn retries_only_transient_statuses() {
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS), StatusAction::Retry);
        assert_eq!(classify(StatusCode::BAD_GATEWAY), StatusAction::Retry);
        assert_eq!(classify(StatusCode::NOT_FOUND), StatusAction::Fail);
        assert_eq!(classify(StatusCode::UNAUTHORIZED), StatusAction::Fail);
    }

    #[test]
    fn auth_failures_map_to_unauthorized() {
        assert!(matches!(status_error(StatusCode::FORBIDDEN), SourceError::Unauthorized(_)));
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS), SourceError::RateLimited));
        assert!(matches!(status_error(StatusCode::NOT_FOUND), SourceError::Http(_)));
    }

    #[test]
    fn search_request_restricts_filing_dates() {
        let request = InsiderSearchRequest::page("issuer.tradingSymbol:TSLA", "2024-01-01", "2024-01-07", 50, 50);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["query"]["query_string"]["query"],
            "(issuer.tradingSymbol:TSLA) AND filedAt:[2024-01-01 TO 2024-01-07]"
        );
        assert_eq!(json["from"], "50");
        assert_eq!(json["size"], "50");
        assert_eq!(json["sort"][0]["filedAt"]["order"], "desc");
    }

    #[test]
    fn search_response_tolerates_missing_transactions() {
        let parsed = parse_search_response(r#"{"total": {"value": 0}}"#).unwrap();
        assert!(parsed.transactions.is_empty());

        let parsed = parse_search_response(r#"{"transactions": [{"accessionNo": "1"}]}"#).unwrap();
        assert_eq!(parsed.transactions.len(), 1);
    }

    #[test]
    fn mapping_response_must_be_an_array() {
        assert_eq!(parse_mapping_response("nasdaq", r#"[{"ticker": "AAPL"}]"#).unwrap().len(), 1);
        assert!(matches!(
            parse_mapping_response("nasdaq", r#"{"error": "bad token"}"#),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn urls_are_built_from_the_base() {
        let mut config = ApiConfig::new("key");
        config.base_url = "http://localhost:8080".to_string();
        let client = SecApiClient::new(config).unwrap();
        assert_eq!(client.insider_url(), "http://localhost:8080/insider-trading");
        assert_eq!(client.mapping_url("nyse"), "http://localhost:8080/mapping/exchange/nyse");
    }

    fn page(len: usize) -> Vec<RawFiling> {
        (0..len).map(|i| serde_json::json!({ "accessionNo": i.to_string() })).collect()
    }

    /// Serves `sizes` as consecutive pages and records each requested offset.
    async fn page_through(page_size: usize, max_pages: usize, sizes: &[usize]) -> (Vec<usize>, usize) {
        let offsets = Mutex::new(Vec::new());
        let filings = collect_pages(page_size, max_pages, Duration::ZERO, |from| {
            let mut seen = offsets.lock();
            let len = sizes.get(seen.len()).copied().unwrap_or(page_size);
            seen.push(from);
            async move { Ok(page(len)) }
        })
        .await
        .unwrap();
        (offsets.into_inner(), filings.len())
    }

    #[tokio::test]
    async fn paging_advances_by_page_size_until_a_short_page() {
        assert_eq!(page_through(2, 10, &[2, 2, 1]).await, (vec![0, 2, 4], 5));
    }

    #[tokio::test]
    async fn paging_stops_on_an_empty_page() {
        assert_eq!(page_through(2, 10, &[2, 0]).await, (vec![0, 2], 2));
    }

    #[tokio::test]
    async fn paging_stops_at_max_pages() {
        assert_eq!(page_through(3, 2, &[]).await, (vec![0, 3], 6));
    }

    #[tokio::test]
    async fn paging_propagates_page_errors() {
        let result = collect_pages(2, 10, Duration::ZERO, |from| async move {
            if from == 0 {
                Ok(page(2))
            } else {
                Err(SourceError::Parse("bad page".to_string()))
            }
        })
        .await;
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
    }

    /// Runs `with_backoff` over `outcomes` and returns the result and attempt count.
    async fn retry_through(max_retries: u32, outcomes: Vec<Attempt<u32>>) -> (Result<u32, SourceError>, usize) {
        let remaining = Mutex::new(outcomes.into_iter());
        let calls = Mutex::new(0usize);
        let result = with_backoff("test request", max_retries, Duration::ZERO, || {
            *calls.lock() += 1;
            let next = remaining.lock().next().unwrap_or(Attempt::Retryable(SourceError::RateLimited));
            async move { next }
        })
        .await;
        (result, calls.into_inner())
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let (result, calls) = retry_through(
            3,
            vec![
                Attempt::Retryable(SourceError::RateLimited),
                Attempt::Retryable(SourceError::Http(StatusCode::BAD_GATEWAY)),
                Attempt::Done(7),
            ],
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let (result, calls) = retry_through(2, Vec::new()).await;
        assert!(matches!(result, Err(SourceError::RateLimited)));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn fatal_failures_are_not_retried() {
        let (result, calls) = retry_through(
            5,
            vec![Attempt::Fatal(SourceError::Unauthorized(StatusCode::UNAUTHORIZED))],
        )
        .await;
        assert!(matches!(result, Err(SourceError::Unauthorized(_))));
        assert_eq!(calls, 1);
    }
}
