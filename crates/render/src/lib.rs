//! Aspect-ratio variant rendering: cover scale, center crop, brand
//! text overlay and compliance scoring.

pub mod compliance;
pub mod overlay;
pub mod renderer;

use thiserror::Error;

pub use compliance::{ComplianceChecker, ComplianceOutcome};
pub use renderer::VariantRenderer;

/// Failures scoped to a single variant. Sibling variants and products
/// proceed regardless.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("source image decode failed: {0}")]
    Decode(String),

    #[error("variant encode failed: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenderError> for creative_core::error::PipelineError {
    fn from(e: RenderError) -> Self {
        creative_core::error::PipelineError::Render(e.to_string())
    }
}
