//! Campaign job orchestration: bounded worker pool, per-job pipeline,
//! execution reporting and output layout.

pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod services;

pub use orchestrator::{CampaignOrchestrator, QueueStats};
pub use pipeline::{JobConclusion, PipelineOutcome, ProductOutcome, VariantFailure};
pub use report::ExecutionReporter;
pub use services::PipelineServices;
