//! End-to-end pipeline flow against mock providers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use creative_assets::{AssetRepository, MemoryAssetRepository};
use creative_core::config::{AppConfig, SafetyPolicy};
use creative_core::error::GenerationError;
use creative_core::types::{AssetOrigin, AssetRecord, JobStatus};
use creative_generation::{GenerationRequest, ImageProvider};
use creative_orchestrator::{CampaignOrchestrator, PipelineServices};
use creative_translation::{TranslationError, TranslationProvider};
use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::json;
use tempfile::TempDir;

fn brand_png_bytes() -> Vec<u8> {
    // Brand primary color so rendered variants pass compliance.
    let img = RgbaImage::from_pixel(640, 640, Rgba([0xFF, 0x6B, 0x35, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

struct CountingImageProvider {
    calls: AtomicUsize,
    png: Bytes,
    /// Prompts containing this substring fail fatally.
    poison: Option<String>,
}

impl CountingImageProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            png: Bytes::from(brand_png_bytes()),
            poison: None,
        })
    }

    fn poisoned(substring: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            png: Bytes::from(brand_png_bytes()),
            poison: Some(substring.to_string()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for CountingImageProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Bytes, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(poison) = &self.poison {
            if request.prompt.contains(poison) {
                return Err(GenerationError::ContentPolicy("rejected".into()));
            }
        }
        Ok(self.png.clone())
    }

    fn name(&self) -> &str {
        "counting-mock"
    }
}

struct EchoTranslationProvider {
    calls: AtomicUsize,
}

impl EchoTranslationProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TranslationProvider for EchoTranslationProvider {
    async fn translate(&self, text: &str, target_name: &str) -> Result<String, TranslationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("[{target_name}] {text}"))
    }

    fn name(&self) -> &str {
        "echo-mock"
    }
}

struct Harness {
    _root: TempDir,
    orchestrator: Arc<CampaignOrchestrator>,
    image_provider: Arc<CountingImageProvider>,
    output_dir: PathBuf,
}

async fn harness_with(
    image_provider: Arc<CountingImageProvider>,
    policy: SafetyPolicy,
    seed_products: &[&str],
) -> Harness {
    let root = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.worker_count = 2;
    config.output_dir = root.path().join("output");
    config.assets_dir = root.path().join("assets");
    config.translation.cache_dir = root.path().join("translations");
    config.safety.policy = policy;

    let repository = Arc::new(MemoryAssetRepository::new());
    for product in seed_products {
        let key = creative_core::types::normalize_product_key(product);
        let location = config.assets_dir.join(format!("{key}.png"));
        std::fs::create_dir_all(&config.assets_dir).unwrap();
        std::fs::write(&location, brand_png_bytes()).unwrap();
        repository.insert(AssetRecord {
            key,
            product_name: product.to_string(),
            location,
            origin: AssetOrigin::Generated,
            cost: 0.04,
            created_at: Utc::now(),
            usage_count: 0,
        });
    }

    let output_dir = config.output_dir.clone();
    let services = PipelineServices::build_with_repository(
        config,
        image_provider.clone(),
        EchoTranslationProvider::new(),
        repository as Arc<dyn AssetRepository>,
    )
    .await
    .unwrap();

    Harness {
        _root: root,
        orchestrator: CampaignOrchestrator::start(services),
        image_provider,
        output_dir,
    }
}

// 1. Reuse one asset, generate the other ------------------------------------

#[tokio::test]
async fn test_two_products_one_cached_end_to_end() {
    let harness = harness_with(
        CountingImageProvider::new(),
        SafetyPolicy::Block,
        &["Solar Lamp"],
    )
    .await;

    let id = harness
        .orchestrator
        .submit_value(json!({
            "campaign_name": "Summer Launch",
            "products": [
                {"name": "Solar Lamp", "description": "warm outdoor light"},
                {"name": "Trail Pack"}
            ],
            "campaign_message": "Light up your nights",
            "target_region": "EMEA",
            "target_audience": "outdoor enthusiasts"
        }))
        .await
        .unwrap();

    let job = harness.orchestrator.wait(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.failures.is_empty());

    // Exactly one provider call: the uncached product.
    assert_eq!(harness.image_provider.calls(), 1);

    let report = harness.orchestrator.report(id).unwrap();
    assert_eq!(report.assets_generated, 1);
    assert_eq!(report.assets_reused, 1);
    assert_eq!(report.variants_rendered, 6);
    assert_eq!(report.variants_failed, 0);
    assert!((report.total_cost - 0.04).abs() < 1e-9);
    assert!((report.compliance_pass_rate - 1.0).abs() < 1e-9);
    assert_eq!(report.legal_flag_count, 0);

    // Output layout.
    let campaign = harness.output_dir.join("Summer_Launch");
    for product in ["solar_lamp", "trail_pack"] {
        for ratio in ["1x1", "9x16", "16x9"] {
            let dir = campaign.join(product).join("en").join(ratio);
            assert!(dir.join(format!("{product}_final.png")).exists());
            assert!(dir.join(format!("{product}_final_metadata.json")).exists());
        }
    }
    assert!(campaign.join("campaign_summary.json").exists());
    assert!(campaign.join("execution_report.json").exists());
    assert!(campaign.join("execution_report.txt").exists());
}

// 2. Blocking policy halts before generation --------------------------------

#[tokio::test]
async fn test_blocking_prohibited_term_halts_before_generation() {
    let harness = harness_with(
        CountingImageProvider::new(),
        SafetyPolicy::Block,
        &[],
    )
    .await;

    let id = harness
        .orchestrator
        .submit_value(json!({
            "campaign_name": "Bold Claims",
            "products": [{"name": "Solar Lamp"}],
            "campaign_message": "Guaranteed results every single time",
            "target_region": "NA",
            "target_audience": "homeowners"
        }))
        .await
        .unwrap();

    let job = harness.orchestrator.wait(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(harness.image_provider.calls(), 0);

    let report = harness.orchestrator.report(id).unwrap();
    assert!(report.legal_flag_count >= 1);
    assert_eq!(report.assets_generated, 0);
}

// 3. Warn policy records flags but proceeds ---------------------------------

#[tokio::test]
async fn test_warn_policy_records_flag_and_proceeds() {
    let harness = harness_with(
        CountingImageProvider::new(),
        SafetyPolicy::Warn,
        &[],
    )
    .await;

    let id = harness
        .orchestrator
        .submit_value(json!({
            "campaign_name": "Bold Claims",
            "products": [{"name": "Solar Lamp"}],
            "campaign_message": "Guaranteed results every single time",
            "target_region": "NA",
            "target_audience": "homeowners"
        }))
        .await
        .unwrap();

    let job = harness.orchestrator.wait(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(harness.image_provider.calls(), 1);

    let report = harness.orchestrator.report(id).unwrap();
    assert!(report.legal_flag_count >= 1);
    assert_eq!(report.variants_rendered, 3);
}

// 4. Partial failure keeps the job completed --------------------------------

#[tokio::test]
async fn test_one_fatal_product_is_partial_success() {
    let harness = harness_with(
        CountingImageProvider::poisoned("Broken Widget"),
        SafetyPolicy::Block,
        &[],
    )
    .await;

    let id = harness
        .orchestrator
        .submit_value(json!({
            "campaign_name": "Mixed Bag",
            "products": [{"name": "Solar Lamp"}, {"name": "Broken Widget"}],
            "campaign_message": "Light up your nights",
            "target_region": "EMEA",
            "target_audience": "outdoor enthusiasts"
        }))
        .await
        .unwrap();

    let job = harness.orchestrator.wait(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.failures.len(), 1);
    assert_eq!(job.failures[0].product, "Broken Widget");

    let report = harness.orchestrator.report(id).unwrap();
    assert_eq!(report.assets_generated, 1);
    assert_eq!(report.product_failure_count, 1);
    assert_eq!(report.variants_rendered, 3);
}

// 5. Every product failing fails the job ------------------------------------

#[tokio::test]
async fn test_all_products_failing_fails_job() {
    let harness = harness_with(
        CountingImageProvider::poisoned("Broken"),
        SafetyPolicy::Block,
        &[],
    )
    .await;

    let id = harness
        .orchestrator
        .submit_value(json!({
            "campaign_name": "All Bad",
            "products": [{"name": "Broken A"}, {"name": "Broken B"}],
            "campaign_message": "Light up your nights",
            "target_region": "EMEA",
            "target_audience": "outdoor enthusiasts"
        }))
        .await
        .unwrap();

    let job = harness.orchestrator.wait(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failures.len(), 2);
}

// 6. Multi-language fan-out --------------------------------------------------

#[tokio::test]
async fn test_languages_render_separate_variants() {
    let harness = harness_with(
        CountingImageProvider::new(),
        SafetyPolicy::Block,
        &[],
    )
    .await;

    let id = harness
        .orchestrator
        .submit_value(json!({
            "campaign_name": "Global Push",
            "products": [{"name": "Solar Lamp"}],
            "campaign_message": "Light up your nights",
            "target_region": "Global",
            "target_audience": "outdoor enthusiasts",
            "target_languages": ["es", "ja"]
        }))
        .await
        .unwrap();

    let job = harness.orchestrator.wait(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let report = harness.orchestrator.report(id).unwrap();
    // 3 languages (en + es + ja) x 3 ratios.
    assert_eq!(report.variants_rendered, 9);

    let product_dir = harness.output_dir.join("Global_Push").join("solar_lamp");
    for lang in ["en", "es", "ja"] {
        assert!(product_dir.join(lang).join("1x1").exists());
    }
}

// 7. Validation rejected at submission --------------------------------------

#[tokio::test]
async fn test_malformed_brief_rejected_at_submit() {
    let harness = harness_with(
        CountingImageProvider::new(),
        SafetyPolicy::Block,
        &[],
    )
    .await;

    let err = harness
        .orchestrator
        .submit_value(json!({
            "campaign_name": "Empty",
            "products": [],
            "campaign_message": "hello",
            "target_region": "EMEA",
            "target_audience": "everyone"
        }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        creative_core::error::PipelineError::Validation(_)
    ));
    assert_eq!(harness.image_provider.calls(), 0);
}

// 8. Queue statistics --------------------------------------------------------

#[tokio::test]
async fn test_queue_stats_after_mixed_outcomes() {
    let harness = harness_with(
        CountingImageProvider::new(),
        SafetyPolicy::Block,
        &[],
    )
    .await;

    let ok = harness
        .orchestrator
        .submit_value(json!({
            "products": [{"name": "Solar Lamp"}],
            "campaign_message": "Light up your nights",
            "target_region": "EMEA",
            "target_audience": "outdoor enthusiasts"
        }))
        .await
        .unwrap();
    let blocked = harness
        .orchestrator
        .submit_value(json!({
            "products": [{"name": "Solar Lamp"}],
            "campaign_message": "guaranteed riches",
            "target_region": "EMEA",
            "target_audience": "outdoor enthusiasts"
        }))
        .await
        .unwrap();

    harness.orchestrator.wait(ok).await.unwrap();
    harness.orchestrator.wait(blocked).await.unwrap();

    let stats = harness.orchestrator.queue_stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.in_progress, 0);
    assert!(stats.avg_processing_secs >= 0.0);
}

// 9. Cancellation ------------------------------------------------------------

#[tokio::test]
async fn test_cancel_unknown_job_is_false() {
    let harness = harness_with(
        CountingImageProvider::new(),
        SafetyPolicy::Block,
        &[],
    )
    .await;
    assert!(!harness.orchestrator.cancel(uuid::Uuid::new_v4()));
}

#[tokio::test]
async fn test_cancel_terminal_job_is_false() {
    let harness = harness_with(
        CountingImageProvider::new(),
        SafetyPolicy::Block,
        &[],
    )
    .await;

    let id = harness
        .orchestrator
        .submit_value(json!({
            "products": [{"name": "Solar Lamp"}],
            "campaign_message": "Light up your nights",
            "target_region": "EMEA",
            "target_audience": "outdoor enthusiasts"
        }))
        .await
        .unwrap();
    harness.orchestrator.wait(id).await.unwrap();
    assert!(!harness.orchestrator.cancel(id));
}
