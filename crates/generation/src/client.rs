//! Retry/backoff discipline around an [`ImageProvider`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use creative_core::config::GenerationConfig;
use creative_core::error::GenerationError;
use rand::Rng;
use tracing::{debug, warn};

use crate::provider::{GenerationRequest, ImageProvider};

/// A successful generation with its recorded cost.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Bytes,
    /// Monetary cost of the successful provider call, in USD.
    pub cost: f64,
    /// Attempts spent, including the successful one.
    pub attempts: u32,
}

/// Calls the external image-generation provider, retrying transient
/// failures with capped exponential backoff. Fatal failures return
/// immediately.
pub struct GenerationClient {
    provider: Arc<dyn ImageProvider>,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn ImageProvider>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    /// Request built from the configured model/size/quality.
    pub fn request(&self, prompt: String) -> GenerationRequest {
        GenerationRequest {
            prompt,
            model: self.config.model.clone(),
            size: self.config.size.clone(),
            quality: self.config.quality.clone(),
        }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        let max_attempts = self.config.max_retries.max(1);
        let mut last: Option<GenerationError> = None;

        for attempt in 0..max_attempts {
            match self.provider.generate(request).await {
                Ok(bytes) => {
                    metrics::counter!("generation_calls_total").increment(1);
                    return Ok(GeneratedImage {
                        bytes,
                        cost: self.config.cost_per_image(),
                        attempts: attempt + 1,
                    });
                }
                Err(e) if e.is_transient() => {
                    metrics::counter!("generation_retries_total").increment(1);
                    warn!(
                        provider = self.provider.name(),
                        attempt = attempt + 1,
                        error = %e,
                        "transient generation failure"
                    );
                    last = Some(e);
                    if attempt + 1 < max_attempts {
                        let delay = self.backoff_delay(attempt);
                        debug!(delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    metrics::counter!("generation_fatal_total").increment(1);
                    return Err(e);
                }
            }
        }

        let last = last.unwrap_or(GenerationError::Timeout);
        Err(GenerationError::RetriesExhausted {
            attempts: max_attempts,
            last: last.to_string(),
        })
    }

    /// base × 2^attempt, capped, plus jitter below half the base so
    /// consecutive delays stay strictly increasing until the cap.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base_ms;
        let exp = base.saturating_mul(1u64 << attempt.min(16));
        let capped = exp.min(self.config.backoff_cap_ms);
        let jitter = rand::thread_rng().gen_range(0..=(base / 2).max(1));
        Duration::from_millis(capped + jitter)
    }
}
