use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::brief::CampaignBrief;

/// The three fixed aspect ratios every campaign variant is rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1, 1080x1080 (feed square).
    #[serde(rename = "1:1")]
    Square,
    /// 9:16, 1080x1920 (stories).
    #[serde(rename = "9:16")]
    Story,
    /// 16:9, 1920x1080 (landscape video platforms).
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [Self::Square, Self::Story, Self::Wide];

    /// Target pixel dimensions for this ratio.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Square => (1080, 1080),
            Self::Story => (1080, 1920),
            Self::Wide => (1920, 1080),
        }
    }

    /// Filesystem-safe tag used in output paths.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Square => "1x1",
            Self::Story => "9x16",
            Self::Wide => "16x9",
        }
    }

    /// Display label, e.g. `1:1`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Story => "9:16",
            Self::Wide => "16:9",
        }
    }
}

/// How a cached source asset came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetOrigin {
    Generated,
    Reused,
}

/// A cached source image for one product identity.
///
/// Created on first generation, its usage counter is bumped on every
/// reuse. The pipeline never deletes records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Normalized product identity (see [`normalize_product_key`]).
    pub key: String,
    pub product_name: String,
    pub location: PathBuf,
    pub origin: AssetOrigin,
    /// Cost incurred when the asset was generated, in USD.
    pub cost: f64,
    pub created_at: DateTime<Utc>,
    pub usage_count: u64,
}

/// One rendered aspect-ratio output for a product/language pair.
/// Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub aspect_ratio: AspectRatio,
    pub language: String,
    pub location: PathBuf,
    /// Brand compliance score in [0, 1].
    pub compliance_score: f64,
    /// True iff the score met the configured threshold.
    pub compliant: bool,
}

/// Terminal and non-terminal states of a campaign job.
///
/// Transitions are monotonic and owned exclusively by the orchestrator:
/// queued -> in_progress -> {completed, failed, cancelled}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A product that could not be processed. Render failures below the
/// product level are absorbed into the variant counts instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductFailure {
    pub product: String,
    pub reason: String,
}

/// One campaign's full run through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignJob {
    pub id: Uuid,
    pub brief: CampaignBrief,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-product failures; empty on full success.
    pub failures: Vec<ProductFailure>,
    /// Job-level error when the job reached `failed` or `cancelled`.
    pub error: Option<String>,
}

impl CampaignJob {
    pub fn new(brief: CampaignBrief) -> Self {
        Self {
            id: Uuid::new_v4(),
            brief,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failures: Vec::new(),
            error: None,
        }
    }
}

/// Cached translation of one (source text, target language) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationEntry {
    /// Hex-encoded SHA-256 of the source text.
    pub source_hash: String,
    pub source_language: String,
    pub target_language: String,
    pub source_text: String,
    pub translated_text: String,
    pub fetched_at: DateTime<Utc>,
}

/// Final aggregation over a job's assets, variants and failures.
/// Produced exactly once, at the transition to a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub campaign_id: Uuid,
    pub campaign_name: String,
    pub assets_generated: u64,
    pub assets_reused: u64,
    /// Total provider spend for this job, in USD.
    pub total_cost: f64,
    pub variants_rendered: u64,
    pub variants_failed: u64,
    /// Fraction of rendered variants that passed compliance, in [0, 1].
    pub compliance_pass_rate: f64,
    pub legal_flag_count: u64,
    pub translation_fallback_count: u64,
    pub product_failure_count: u64,
    pub duration_secs: f64,
}

/// Normalize a product name to the cache key / directory-safe form:
/// lowercase, spaces to underscores, everything else alphanumeric-only.
pub fn normalize_product_key(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_product_key() {
        assert_eq!(normalize_product_key("Solar Lamp"), "solar_lamp");
        assert_eq!(normalize_product_key("Déjà-Vu 2.0"), "déjàvu_20");
        assert_eq!(normalize_product_key("already_safe"), "already_safe");
    }

    #[test]
    fn test_aspect_ratio_dimensions() {
        assert_eq!(AspectRatio::Square.dimensions(), (1080, 1080));
        assert_eq!(AspectRatio::Story.dimensions(), (1080, 1920));
        assert_eq!(AspectRatio::Wide.dimensions(), (1920, 1080));
        assert_eq!(AspectRatio::ALL.len(), 3);
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_aspect_ratio_serde_labels() {
        let json = serde_json::to_string(&AspectRatio::Story).unwrap();
        assert_eq!(json, "\"9:16\"");
        let back: AspectRatio = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(back, AspectRatio::Wide);
    }
}
