//! Translation provider seam.

use std::time::Duration;

use async_trait::async_trait;
use creative_core::config::TranslationConfig;
use serde::Deserialize;
use tracing::debug;

use crate::TranslationError;

/// Seam to the external translation service. `target_name` is the
/// display name of the language ("Japanese"), not the code.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str, target_name: &str) -> Result<String, TranslationError>;

    fn name(&self) -> &str;
}

/// Chat-completions-backed translation with a marketing-advertisement
/// context prompt.
pub struct HttpTranslationProvider {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

impl HttpTranslationProvider {
    pub fn new(config: &TranslationConfig) -> Result<Self, TranslationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TranslationError::Provider(format!("http client init: {e}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    async fn translate(&self, text: &str, target_name: &str) -> Result<String, TranslationError> {
        debug!(target = target_name, "translation call");
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.3,
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "You are a professional translator for marketing advertisements. \
                         Translate the user's campaign message into {target_name}. Keep the \
                         tone persuasive and concise. Respond with the translation only."
                    )
                },
                { "role": "user", "content": text }
            ],
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
                    TranslationError::Timeout
                } else {
                    TranslationError::Provider(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TranslationError::Provider(format!(
                "status {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::Provider(format!("malformed response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| TranslationError::Provider("empty response".into()))
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}
