// src/pipeline/staleness.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::pipeline::tasks::EtlTask;
use crate::storage::StalenessStore;
use crate::utils::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// A dataset is stale when it was never refreshed or its marker is at
/// least `window` old.
pub fn freshness(last_updated: Option<DateTime<Utc>>, window: Duration, now: DateTime<Utc>) -> Freshness {
    match last_updated {
        Some(last) if now - last < window => Freshness::Fresh,
        _ => Freshness::Stale,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Skipped { last_updated: DateTime<Utc> },
    Refreshed { rows: usize },
}

/// Runs a task only when its dataset is stale, and advances the marker
/// only after the whole cycle succeeded.
pub struct StalenessGate {
    store: Arc<dyn StalenessStore>,
}

impl StalenessGate {
    pub fn new(store: Arc<dyn StalenessStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self, task: &dyn EtlTask, now: DateTime<Utc>) -> Result<TaskOutcome, PipelineError> {
        let last_updated = self.store.last_updated(task.name())?;

        if let (Freshness::Fresh, Some(last)) = (freshness(last_updated, task.window(), now), last_updated) {
            info!("{} is fresh (last updated {}), skipping", task.name(), last);
            return Ok(TaskOutcome::Skipped { last_updated: last });
        }

        match last_updated {
            Some(last) => info!("{} is stale (last updated {}), refreshing", task.name(), last),
            None => info!("{} has never been loaded, refreshing", task.name()),
        }

        let rows = task.execute(last_updated, now).await?;
        self.store.set_last_updated(task.name(), now)?;
        info!("{} refreshed with {} rows", task.name(), rows);
        Ok(TaskOutcome::Refreshed { rows })
    }
}
