// src/config.rs
//! Process-wide configuration, resolved once at startup and passed down
//! explicitly. Nothing in the pipeline reads the environment on its own.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use crate::utils::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api.sec-api.io";

/// Connection settings for the filings API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub page_size: usize,
    pub max_pages: usize,
    /// Pause between consecutive page requests.
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 50,
            max_pages: 100,
            request_delay: Duration::from_millis(200),
            timeout: Duration::from_secs(10),
            max_retries: 4,
        }
    }
}

/// Staleness windows per dataset.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub mapping_days: i64,
    pub transactions_days: i64,
}

impl RefreshConfig {
    pub fn mapping_window(&self) -> ChronoDuration {
        ChronoDuration::days(self.mapping_days)
    }

    pub fn transactions_window(&self) -> ChronoDuration {
        ChronoDuration::days(self.transactions_days)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            mapping_days: 30,
            transactions_days: 7,
        }
    }
}

/// Plausibility filters applied to cleaned transactions. The defaults were
/// tuned against artifacts observed in the upstream feed.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub max_price_per_share: f64,
    pub excluded_codes: BTreeSet<String>,
    pub excluded_tickers: BTreeSet<String>,
    /// Issuers observed to misreport share prices.
    pub denied_issuer_ciks: BTreeSet<u64>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_price_per_share: 6000.0,
            excluded_codes: ["M"].iter().map(|s| s.to_string()).collect(),
            excluded_tickers: ["NONE", "N/A", "NA"].iter().map(|s| s.to_string()).collect(),
            denied_issuer_ciks: [810893, 1454510, 1463208, 1877939, 1556801, 827187]
                .into_iter()
                .collect(),
        }
    }
}

/// Cleaning and mapping policies that are decisions rather than facts.
#[derive(Debug, Clone)]
pub struct TransformPolicy {
    /// Fill a missing transaction date from the filing's period of report.
    pub backfill_transaction_date: bool,
    /// Drop exchange-mapping rows explicitly flagged as delisted.
    pub drop_delisted: bool,
}

impl Default for TransformPolicy {
    fn default() -> Self {
        Self {
            backfill_transaction_date: true,
            drop_delisted: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` until a command that talks to the API requires it.
    pub api_key: Option<String>,
    pub base_url: String,
    pub page_size: usize,
    pub max_pages: usize,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub query: String,
    pub exchanges: Vec<String>,
    pub refresh: RefreshConfig,
    pub rules: ValidationRules,
    pub policy: TransformPolicy,
    pub write_staging: bool,
}

impl AppConfig {
    /// Loads `.env` (if present) and resolves every setting from the environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup`; split out so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("SEC_API_KEY").or_else(|| get("SECAPI_KEY"));
        let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "./data".to_string()));
        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("insider.db"));

        let exchanges: Vec<String> = get("EXCHANGES")
            .unwrap_or_else(|| "nasdaq,nyse".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if exchanges.is_empty() {
            return Err(AppError::Config("EXCHANGES must name at least one exchange".to_string()));
        }

        let refresh = RefreshConfig {
            mapping_days: parse_or(&get, "MAPPING_REFRESH_DAYS", 30)?,
            transactions_days: parse_or(&get, "TRANSACTIONS_REFRESH_DAYS", 7)?,
        };
        if refresh.mapping_days <= 0 || refresh.transactions_days <= 0 {
            return Err(AppError::Config("refresh windows must be positive day counts".to_string()));
        }

        let page_size: usize = parse_or(&get, "PAGE_SIZE", 50)?;
        if page_size == 0 {
            return Err(AppError::Config("PAGE_SIZE must be greater than zero".to_string()));
        }

        Ok(Self {
            api_key,
            base_url: get("SEC_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            page_size,
            max_pages: parse_or(&get, "MAX_PAGES", 100)?,
            request_delay: Duration::from_millis(parse_or(&get, "REQUEST_DELAY_MS", 200)?),
            timeout: Duration::from_secs(parse_or(&get, "API_TIMEOUT", 10)?),
            max_retries: parse_or(&get, "MAX_RETRIES", 4)?,
            data_dir,
            database_path,
            query: get("INSIDER_QUERY").unwrap_or_else(|| "*:*".to_string()),
            exchanges,
            refresh,
            rules: ValidationRules::default(),
            policy: TransformPolicy::default(),
            write_staging: parse_or(&get, "WRITE_STAGING", false)?,
        })
    }

    /// API settings; fails when no credential was configured.
    pub fn api(&self) -> Result<ApiConfig, AppError> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            AppError::Config("Missing SEC_API_KEY environment variable. Set it before running.".to_string())
        })?;
        Ok(ApiConfig {
            api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            page_size: self.page_size,
            max_pages: self.max_pages,
            request_delay: self.request_delay,
            timeout: self.timeout,
            max_retries: self.max_retries,
        })
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.data_dir.join("final")
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("Invalid value for {}: '{}' ({})", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.exchanges, vec!["nasdaq", "nyse"]);
        assert_eq!(config.refresh.mapping_days, 30);
        assert_eq!(config.refresh.transactions_days, 7);
        assert_eq!(config.database_path, PathBuf::from("./data").join("insider.db"));
        assert!(!config.write_staging);
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(matches!(config.api(), Err(AppError::Config(_))));
    }

    #[test]
    fn api_key_alias_is_accepted() {
        let config = AppConfig::from_lookup(lookup(&[("SECAPI_KEY", "abc")])).unwrap();
        assert_eq!(config.api().unwrap().api_key, "abc");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("PAGE_SIZE", "many")])).unwrap_err();
        assert!(matches!(err, AppError::Config(ref msg) if msg.contains("PAGE_SIZE")));
    }

    #[test]
    fn overrides_are_read() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SEC_API_KEY", "k"),
            ("SEC_API_BASE_URL", "http://localhost:9000/"),
            ("EXCHANGES", "NYSE, nasdaq ,"),
            ("TRANSACTIONS_REFRESH_DAYS", "14"),
            ("WRITE_STAGING", "true"),
        ]))
        .unwrap();
        assert_eq!(config.exchanges, vec!["nyse", "nasdaq"]);
        assert_eq!(config.refresh.transactions_days, 14);
        assert!(config.write_staging);
        assert_eq!(config.api().unwrap().base_url, "http://localhost:9000");
    }
}
