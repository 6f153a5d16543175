// src/pipeline/tasks.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::frame::Frame;
use crate::source::FilingSource;
use crate::storage::sqlite::{MAPPING_TABLE, TRANSACTIONS_TABLE};
use crate::storage::{FinalWriter, LoadSink, RawWriter, StagingWriter};
use crate::transform::mapping::mapping_frame;
use crate::transform::records::ExchangeMappingRecord;
use crate::transform::{MappingTransformer, TransactionTransformer};
use crate::utils::error::{PipelineError, StorageError};

/// One dataset refresh: extract → persist raw → transform → persist final → load.
#[async_trait]
pub trait EtlTask: Send + Sync {
    /// Dataset name; also the key of its staleness marker.
    fn name(&self) -> &str;

    /// Maximum age of the dataset before it is refreshed again.
    fn window(&self) -> Duration;

    /// Runs the full cycle and returns the number of final rows.
    async fn execute(&self, last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<usize, PipelineError>;
}

/// Output layers shared by both tasks.
struct Layers {
    raw: RawWriter,
    staging: Option<StagingWriter>,
}

impl Layers {
    fn from_config(config: &AppConfig) -> Result<Self, StorageError> {
        let staging = if config.write_staging {
            Some(StagingWriter::new(config.staging_dir())?)
        } else {
            None
        };
        Ok(Self {
            raw: RawWriter::new(config.raw_dir())?,
            staging,
        })
    }
}

pub struct ExchangeMappingTask {
    source: Arc<dyn FilingSource>,
    sink: Arc<dyn LoadSink>,
    exchanges: Vec<String>,
    window: Duration,
    layers: Layers,
    final_writer: FinalWriter,
    transformer: MappingTransformer,
}

impl ExchangeMappingTask {
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn FilingSource>,
        sink: Arc<dyn LoadSink>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            source,
            sink,
            exchanges: config.exchanges.clone(),
            window: config.refresh.mapping_window(),
            layers: Layers::from_config(config)?,
            final_writer: FinalWriter::exchange_mapping(config.final_dir())?,
            transformer: MappingTransformer::new(config.policy.clone()),
        })
    }
}

#[async_trait]
impl EtlTask for ExchangeMappingTask {
    fn name(&self) -> &str {
        MAPPING_TABLE
    }

    fn window(&self) -> Duration {
        self.window
    }

    async fn execute(&self, _last_updated: Option<DateTime<Utc>>, _now: DateTime<Utc>) -> Result<usize, PipelineError> {
        info!("Fetching exchange mapping for {:?}", self.exchanges);
        let raw = self.source.fetch_exchange_mapping(&self.exchanges).await?;
        self.layers.raw.save(MAPPING_TABLE, &raw)?;

        let records = self.transformer.transform(&raw, self.layers.staging.as_ref())?;
        let frame = mapping_frame(&records)?;
        self.final_writer.save(MAPPING_TABLE, &frame)?;

        let written = self.sink.upsert(MAPPING_TABLE, &frame, ExchangeMappingRecord::KEY_COLUMNS)?;
        debug!("Exchange mapping load wrote {} rows", written);
        Ok(frame.len())
    }
}

/// Date range of the next transactions extract.
///
/// Without a marker the last `lookback_days` are fetched; otherwise the
/// range starts the day after the last refresh. Both ends are UTC dates.
pub fn extract_window(
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback_days: i64,
) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive();
    let start = match last_updated {
        None => today - Duration::days(lookback_days),
        Some(last) => last.date_naive() + Duration::days(1),
    };
    (start.min(today), today)
}

pub struct InsiderTransactionsTask {
    source: Arc<dyn FilingSource>,
    sink: Arc<dyn LoadSink>,
    query: String,
    lookback_days: i64,
    window: Duration,
    layers: Layers,
    final_writer: FinalWriter,
    transformer: TransactionTransformer,
}

impl InsiderTransactionsTask {
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn FilingSource>,
        sink: Arc<dyn LoadSink>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            source,
            sink,
            query: config.query.clone(),
            lookback_days: config.refresh.transactions_days,
            window: config.refresh.transactions_window(),
            layers: Layers::from_config(config)?,
            final_writer: FinalWriter::transactions(config.final_dir())?,
            transformer: TransactionTransformer::new(config.policy.clone(), config.rules.clone()),
        })
    }
}

#[async_trait]
impl EtlTask for InsiderTransactionsTask {
    fn name(&self) -> &str {
        TRANSACTIONS_TABLE
    }

    fn window(&self) -> Duration {
        self.window
    }

    async fn execute(&self, last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        let (start, end) = extract_window(last_updated, now, self.lookback_days);
        let (start, end) = (start.format("%Y-%m-%d").to_string(), end.format("%Y-%m-%d").to_string());
        info!("Fetching insider transactions filed {} to {} ({})", start, end, self.query);

        let raw = self.source.fetch_insider_transactions(&self.query, &start, &end).await?;
        self.layers.raw.save(TRANSACTIONS_TABLE, &raw)?;

        let records = self.transformer.transform(&raw, self.layers.staging.as_ref())?;
        let frame = Frame::from_records(&records).map_err(StorageError::from)?;
        self.final_writer.save(TRANSACTIONS_TABLE, &frame)?;

        let inserted = self.sink.insert_many(TRANSACTIONS_TABLE, &frame)?;
        debug!("Insider transactions load inserted {} new rows", inserted);
        Ok(frame.len())
    }
}
