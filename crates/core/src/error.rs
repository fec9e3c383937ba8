use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Brief validation error: {0}")]
    Validation(String),

    #[error("Prohibited content: {0}")]
    LegalFlag(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Failure modes of the external image-generation provider.
///
/// Transient variants are eligible for retry with exponential backoff;
/// fatal variants surface immediately and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("provider rate limited")]
    RateLimited,

    #[error("provider call timed out")]
    Timeout,

    #[error("provider upstream error (status {0})")]
    Upstream(u16),

    #[error("invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("content policy rejection: {0}")]
    ContentPolicy(String),

    #[error("provider quota exhausted")]
    QuotaExhausted,

    #[error("generation failed: {0}")]
    Fatal(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::Upstream(_)
        )
    }
}
