// src/pipeline/orchestrator.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::pipeline::staleness::{StalenessGate, TaskOutcome};
use crate::pipeline::tasks::{EtlTask, ExchangeMappingTask, InsiderTransactionsTask};
use crate::source::FilingSource;
use crate::storage::{LoadSink, StalenessStore};
use crate::utils::error::{PipelineError, StorageError};

/// Result of one dataset within a run.
#[derive(Debug)]
pub struct DatasetReport {
    pub dataset: String,
    pub result: Result<TaskOutcome, PipelineError>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub datasets: Vec<DatasetReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.datasets.iter().filter(|d| d.result.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

/// Refreshes the exchange mapping, then insider transactions. A failure in
/// one dataset is reported and does not stop the next.
pub struct InsiderPipeline {
    gate: StalenessGate,
    tasks: Vec<Box<dyn EtlTask>>,
}

impl InsiderPipeline {
    pub fn new(store: Arc<dyn StalenessStore>) -> Self {
        Self {
            gate: StalenessGate::new(store),
            tasks: Vec::new(),
        }
    }

    pub fn with_task<T: EtlTask + 'static>(mut self, task: T) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// The standard two-dataset pipeline.
    pub fn from_config(
        config: &AppConfig,
        source: Arc<dyn FilingSource>,
        store: Arc<dyn StalenessStore>,
        sink: Arc<dyn LoadSink>,
    ) -> Result<Self, StorageError> {
        Ok(Self::new(store)
            .with_task(ExchangeMappingTask::new(config, source.clone(), sink.clone())?)
            .with_task(InsiderTransactionsTask::new(config, source, sink)?))
    }

    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::default();
        for task in &self.tasks {
            let result = self.gate.run(task.as_ref(), now).await;
            if let Err(e) = &result {
                error!("Dataset {} failed: {}", task.name(), e);
            }
            report.datasets.push(DatasetReport {
                dataset: task.name().to_string(),
                result,
            });
        }
        info!(
            "Pipeline finished: {} datasets, {} failed",
            report.datasets.len(),
            report.failures()
        );
        report
    }
}
