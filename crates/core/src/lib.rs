pub mod brief;
pub mod config;
pub mod error;
pub mod types;

pub use brief::{CampaignBrief, Product};
pub use config::AppConfig;
pub use error::{GenerationError, PipelineError, PipelineResult};
