use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Languages the pipeline accepts, with the display names fed to the
/// translation provider.
pub const SUPPORTED_LANGUAGES: [(&str, &str); 10] = [
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("zh", "Chinese (Simplified)"),
    ("zh-TW", "Chinese (Traditional)"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
];

/// Display name for a supported language code.
pub fn language_name(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| *n)
}

const MAX_PRODUCT_NAME_LEN: usize = 100;
const MAX_MESSAGE_LEN: usize = 500;
const MAX_REGION_LEN: usize = 50;
const MAX_AUDIENCE_LEN: usize = 200;

/// Substrings that mark an input as an injection attempt. Matched
/// case-insensitively against every free-text field.
const INJECTION_PATTERNS: [&str; 6] = [
    "<script",
    "javascript:",
    "onerror=",
    "onclick=",
    "eval(",
    "exec(",
];

/// One product line in a campaign brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A validated campaign brief. Construct via [`CampaignBrief::from_value`]
/// or [`CampaignBrief::from_file`]; every field has already been
/// sanitized and bounds-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub campaign_name: String,
    pub products: Vec<Product>,
    pub campaign_message: String,
    pub target_region: String,
    pub target_audience: String,
    /// Deduplicated, validated language codes. Always contains at
    /// least the source language "en".
    pub languages: Vec<String>,
}

/// Wire shape of an incoming brief before validation.
#[derive(Debug, Deserialize)]
struct RawBrief {
    #[serde(default)]
    campaign_name: Option<String>,
    #[serde(default)]
    products: Vec<RawProduct>,
    campaign_message: String,
    target_region: Option<String>,
    target_audience: Option<String>,
    #[serde(default, alias = "languages")]
    target_languages: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawProduct {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        description: String,
    },
}

impl CampaignBrief {
    /// Parse and validate a brief from an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> PipelineResult<Self> {
        let raw: RawBrief = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    /// Read, parse and validate a brief file.
    pub async fn from_file(path: &Path) -> PipelineResult<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let raw: RawBrief = serde_json::from_str(&text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawBrief) -> PipelineResult<Self> {
        if raw.products.is_empty() {
            return Err(PipelineError::Validation(
                "brief must list at least one product".into(),
            ));
        }

        let campaign_name = match raw.campaign_name {
            Some(name) if !name.trim().is_empty() => {
                sanitize_text("campaign_name", &name, MAX_PRODUCT_NAME_LEN)?
            }
            _ => default_campaign_name(),
        };

        let mut products = Vec::with_capacity(raw.products.len());
        for product in raw.products {
            let (name, description) = match product {
                RawProduct::Name(name) => (name, String::new()),
                RawProduct::Full { name, description } => (name, description),
            };
            let name = sanitize_text("product name", &name, MAX_PRODUCT_NAME_LEN)?;
            if name.is_empty() {
                return Err(PipelineError::Validation("product name is empty".into()));
            }
            let description = if description.is_empty() {
                description
            } else {
                sanitize_text("product description", &description, MAX_MESSAGE_LEN)?
            };
            products.push(Product { name, description });
        }

        let campaign_message =
            sanitize_text("campaign_message", &raw.campaign_message, MAX_MESSAGE_LEN)?;
        if campaign_message.is_empty() {
            return Err(PipelineError::Validation(
                "campaign_message is empty".into(),
            ));
        }

        let target_region = match raw.target_region {
            Some(region) if !region.trim().is_empty() => {
                sanitize_text("target_region", &region, MAX_REGION_LEN)?
            }
            _ => {
                return Err(PipelineError::Validation(
                    "target_region is required".into(),
                ))
            }
        };
        let target_audience = match raw.target_audience {
            Some(audience) if !audience.trim().is_empty() => {
                sanitize_text("target_audience", &audience, MAX_AUDIENCE_LEN)?
            }
            _ => {
                return Err(PipelineError::Validation(
                    "target_audience is required".into(),
                ))
            }
        };

        let languages = validate_language_codes(&raw.target_languages)?;

        Ok(Self {
            campaign_name,
            products,
            campaign_message,
            target_region,
            target_audience,
            languages,
        })
    }

    /// Directory-safe form of the campaign name.
    pub fn dir_name(&self) -> String {
        sanitize_filename(&self.campaign_name)
    }
}

/// Trim, bounds-check and injection-scan one free-text field.
pub fn sanitize_text(field: &str, value: &str, max_len: usize) -> PipelineResult<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() > max_len {
        return Err(PipelineError::Validation(format!(
            "{field} exceeds {max_len} characters"
        )));
    }
    let lowered = trimmed.to_lowercase();
    for pattern in INJECTION_PATTERNS {
        if lowered.contains(pattern) {
            return Err(PipelineError::Validation(format!(
                "{field} contains disallowed pattern '{pattern}'"
            )));
        }
    }
    Ok(trimmed.to_string())
}

/// Validate and dedupe language codes. "en" is always present and
/// always first; unknown codes are rejected rather than skipped.
pub fn validate_language_codes(codes: &[String]) -> PipelineResult<Vec<String>> {
    let mut languages = vec!["en".to_string()];
    for code in codes {
        let normalized = normalize_language_code(code);
        if language_name(&normalized).is_none() {
            return Err(PipelineError::Validation(format!(
                "unsupported language code '{code}'"
            )));
        }
        if !languages.contains(&normalized) {
            languages.push(normalized);
        }
    }
    Ok(languages)
}

/// Lowercase the primary subtag but preserve region casing (zh-TW).
fn normalize_language_code(code: &str) -> String {
    let trimmed = code.trim();
    match trimmed.split_once('-') {
        Some((lang, region)) => format!("{}-{}", lang.to_lowercase(), region.to_uppercase()),
        None => trimmed.to_lowercase(),
    }
}

fn default_campaign_name() -> String {
    format!("campaign_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Reduce any string to a safe path component.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('_').to_string()
}
