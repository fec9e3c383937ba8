//! Two-level translation cache over an external provider.
//!
//! Identical (text, language) pairs short-circuit to the cached value;
//! provider failures degrade to the source text instead of failing the
//! job.

pub mod cache;
pub mod provider;

use thiserror::Error;

pub use cache::{TranslationCache, TranslationOutcome};
pub use provider::{HttpTranslationProvider, TranslationProvider};

/// Provider-level translation failures. All are treated as transient
/// by the cache: it retries, then falls back to the source text.
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    #[error("translation provider call failed: {0}")]
    Provider(String),

    #[error("translation provider timed out")]
    Timeout,
}
