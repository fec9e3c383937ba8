//! Image-generation provider seam.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use creative_core::config::GenerationConfig;
use creative_core::error::GenerationError;
use serde::Deserialize;
use tracing::debug;

/// One image request as handed to a provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub size: String,
    pub quality: String,
}

/// Seam to the external image-generation service. The retry discipline
/// lives in [`GenerationClient`](crate::client::GenerationClient);
/// providers surface each call's outcome once.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Bytes, GenerationError>;

    fn name(&self) -> &str;
}

/// OpenAI-style HTTP image provider returning `b64_json` payloads.
pub struct OpenAiImageProvider {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAiImageProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::Fatal(format!("http client init: {e}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn classify_status(status: u16, body: &str) -> GenerationError {
        let parsed: Option<ErrorResponse> = serde_json::from_str(body).ok();
        let (message, code) = match parsed {
            Some(r) => (r.error.message, r.error.code.unwrap_or_default()),
            None => (body.chars().take(200).collect(), String::new()),
        };
        match status {
            429 if code == "insufficient_quota" => GenerationError::QuotaExhausted,
            429 => GenerationError::RateLimited,
            400 if code == "content_policy_violation" => GenerationError::ContentPolicy(message),
            400 | 401 | 403 | 404 | 422 => GenerationError::InvalidRequest(message),
            s if s >= 500 => GenerationError::Upstream(s),
            s => GenerationError::InvalidRequest(format!("unexpected status {s}: {message}")),
        }
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Bytes, GenerationError> {
        debug!(model = %request.model, size = %request.size, "image generation call");
        let body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "n": 1,
            "size": request.size,
            "quality": request.quality,
            "response_format": "b64_json",
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Upstream(e.status().map(|s| s.as_u16()).unwrap_or(502))
                }
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::Upstream(502)
            }
        })?;

        if !(200..300).contains(&status) {
            return Err(Self::classify_status(status, &text));
        }

        let parsed: ImagesResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Fatal(format!("malformed provider response: {e}")))?;
        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Fatal("provider returned no images".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(datum.b64_json)
            .map_err(|e| GenerationError::Fatal(format!("invalid b64_json payload: {e}")))?;
        Ok(Bytes::from(bytes))
    }

    fn name(&self) -> &str {
        "openai-images"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit_vs_quota() {
        let rate = OpenAiImageProvider::classify_status(429, r#"{"error":{"message":"slow down"}}"#);
        assert_eq!(rate, GenerationError::RateLimited);

        let quota = OpenAiImageProvider::classify_status(
            429,
            r#"{"error":{"message":"billing","code":"insufficient_quota"}}"#,
        );
        assert_eq!(quota, GenerationError::QuotaExhausted);
    }

    #[test]
    fn test_classify_content_policy() {
        let err = OpenAiImageProvider::classify_status(
            400,
            r#"{"error":{"message":"rejected","code":"content_policy_violation"}}"#,
        );
        assert!(matches!(err, GenerationError::ContentPolicy(_)));
    }

    #[test]
    fn test_classify_server_errors_transient() {
        assert!(OpenAiImageProvider::classify_status(503, "oops").is_transient());
        assert!(!OpenAiImageProvider::classify_status(400, "bad").is_transient());
    }
}
