//! Pipeline orchestration module.

mod listener;
mod orchestrator;
mod reporter;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
