// src/pipeline/mod.rs
pub mod orchestrator;
pub mod staleness;
pub mod tasks;

#[cfg(test)]
pub(crate) mod fakes;

pub use orchestrator::InsiderPipeline;
pub use staleness::TaskOutcome;
