//! The per-job pipeline: safety scan, translation fan-out, per-product
//! generate/render with bounded parallelism.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use creative_assets::GeneratedAsset;
use creative_core::brief::{CampaignBrief, Product};
use creative_core::config::SafetyPolicy;
use creative_core::error::GenerationError;
use creative_core::types::{normalize_product_key, AspectRatio, AssetOrigin, AssetRecord, Variant};
use creative_generation::prompt::DEFAULT_TEMPLATE;
use creative_safety::SafetyMatch;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::services::PipelineServices;

/// How a job's pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobConclusion {
    Completed,
    Failed(String),
    Cancelled,
}

/// A render failure scoped to one variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantFailure {
    pub aspect_ratio: AspectRatio,
    pub language: String,
    pub reason: String,
}

/// Everything that happened for one product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductOutcome {
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetRecord>,
    /// True when this job paid for a fresh generation.
    pub generated: bool,
    pub cost: f64,
    pub variants: Vec<Variant>,
    pub variant_failures: Vec<VariantFailure>,
    /// Product-level failure; set when no asset could be produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ProductOutcome {
    fn failed(product: &str, reason: String) -> Self {
        Self {
            product: product.to_string(),
            asset: None,
            generated: false,
            cost: 0.0,
            variants: Vec::new(),
            variant_failures: Vec::new(),
            failure: Some(reason),
        }
    }
}

/// Aggregated result of one pipeline run, consumed by the reporter and
/// the output writer.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub products: Vec<ProductOutcome>,
    pub legal_flags: Vec<SafetyMatch>,
    pub translation_fallbacks: u64,
}

impl PipelineOutcome {
    pub fn assets_generated(&self) -> u64 {
        self.products.iter().filter(|p| p.generated).count() as u64
    }

    pub fn assets_reused(&self) -> u64 {
        self.products
            .iter()
            .filter(|p| !p.generated && p.asset.is_some())
            .count() as u64
    }

    pub fn total_cost(&self) -> f64 {
        self.products.iter().map(|p| p.cost).sum()
    }
}

/// Run one job's pipeline to completion. Step order is fixed; only
/// per-product work and per-language translation fan out.
pub async fn run_pipeline(
    services: &Arc<PipelineServices>,
    brief: &CampaignBrief,
    cancel: &Arc<AtomicBool>,
) -> (JobConclusion, PipelineOutcome) {
    let mut outcome = PipelineOutcome::default();

    if cancel.load(Ordering::SeqCst) {
        return (JobConclusion::Cancelled, outcome);
    }

    // Safety scan comes before any cost is incurred.
    let safety = services.safety.scan(&brief.campaign_message);
    outcome.legal_flags = safety.matches.clone();
    if safety.flagged {
        metrics::counter!("safety_flags_total").increment(safety.matches.len() as u64);
        match services.safety.policy() {
            SafetyPolicy::Block => {
                warn!(
                    campaign = %brief.campaign_name,
                    matches = safety.matches.len(),
                    "prohibited content, blocking before generation"
                );
                return (
                    JobConclusion::Failed(format!(
                        "campaign message contains prohibited content ({} matches)",
                        safety.matches.len()
                    )),
                    outcome,
                );
            }
            SafetyPolicy::Warn => {
                warn!(
                    campaign = %brief.campaign_name,
                    matches = safety.matches.len(),
                    "prohibited content recorded, proceeding per policy"
                );
            }
        }
    }

    // Message translations, fanned out per language.
    let (translations, fallbacks) = translate_message(services, brief).await;
    outcome.translation_fallbacks = fallbacks;

    if cancel.load(Ordering::SeqCst) {
        return (JobConclusion::Cancelled, outcome);
    }

    // Per-product fan-out, bounded by the generation concurrency limit.
    let semaphore = Arc::new(Semaphore::new(services.config.generation.max_concurrent.max(1)));
    let translations = Arc::new(translations);
    let mut set = JoinSet::new();
    for (index, product) in brief.products.iter().enumerate() {
        let services = services.clone();
        let semaphore = semaphore.clone();
        let translations = translations.clone();
        let cancel = cancel.clone();
        let product = product.clone();
        let brief = brief.clone();
        set.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    process_product(&services, &brief, &product, &translations, &cancel).await
                }
                Err(_) => ProductOutcome::failed(&product.name, "worker pool shut down".into()),
            };
            (index, result)
        });
    }

    let mut products: Vec<(usize, ProductOutcome)> = Vec::with_capacity(brief.products.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(entry) => products.push(entry),
            Err(e) => warn!(error = %e, "product task panicked"),
        }
    }
    products.sort_by_key(|(index, _)| *index);
    outcome.products = products.into_iter().map(|(_, p)| p).collect();

    if cancel.load(Ordering::SeqCst) {
        return (JobConclusion::Cancelled, outcome);
    }

    let succeeded = outcome.products.iter().filter(|p| p.failure.is_none()).count();
    if succeeded == 0 {
        return (
            JobConclusion::Failed("every product in the campaign failed".into()),
            outcome,
        );
    }
    (JobConclusion::Completed, outcome)
}

/// Translate the campaign message into every target language
/// concurrently. The source language maps to the message itself.
async fn translate_message(
    services: &Arc<PipelineServices>,
    brief: &CampaignBrief,
) -> (HashMap<String, String>, u64) {
    let mut translations = HashMap::new();
    let mut fallbacks = 0u64;

    let mut set = JoinSet::new();
    for lang in &brief.languages {
        let services = services.clone();
        let lang = lang.clone();
        let message = brief.campaign_message.clone();
        set.spawn(async move {
            let outcome = services.translations.translate(&message, &lang).await;
            (lang, outcome)
        });
    }
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((lang, result)) => {
                if result.fell_back {
                    fallbacks += 1;
                }
                translations.insert(lang, result.text);
            }
            Err(e) => warn!(error = %e, "translation task panicked"),
        }
    }
    (translations, fallbacks)
}

async fn process_product(
    services: &Arc<PipelineServices>,
    brief: &CampaignBrief,
    product: &Product,
    translations: &HashMap<String, String>,
    cancel: &Arc<AtomicBool>,
) -> ProductOutcome {
    if cancel.load(Ordering::SeqCst) {
        return ProductOutcome::failed(&product.name, "job cancelled".into());
    }

    // Reuse-or-generate the source asset; concurrent jobs asking for
    // the same product collapse into one provider call.
    let acquired = services
        .assets
        .acquire(&product.name, || generate_source(services, product))
        .await;

    let (record, hit) = match acquired {
        Ok(pair) => pair,
        Err(e) => {
            warn!(product = %product.name, error = %e, "asset generation failed");
            return ProductOutcome::failed(&product.name, e.to_string());
        }
    };

    let source = match tokio::fs::read(&record.location).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ProductOutcome::failed(
                &product.name,
                format!("cached source unreadable: {e}"),
            );
        }
    };

    let mut result = ProductOutcome {
        product: product.name.clone(),
        generated: !hit && record.origin == AssetOrigin::Generated,
        cost: if hit { 0.0 } else { record.cost },
        asset: Some(record),
        variants: Vec::new(),
        variant_failures: Vec::new(),
        failure: None,
    };

    let product_key = normalize_product_key(&product.name);
    let campaign_dir = services.config.output_dir.join(brief.dir_name());

    for lang in &brief.languages {
        if cancel.load(Ordering::SeqCst) {
            return result;
        }
        let text = translations
            .get(lang)
            .cloned()
            .unwrap_or_else(|| brief.campaign_message.clone());

        for ratio in AspectRatio::ALL {
            if cancel.load(Ordering::SeqCst) {
                return result;
            }
            let out_path = campaign_dir
                .join(&product_key)
                .join(lang)
                .join(ratio.tag())
                .join(format!("{product_key}_final.png"));
            match services.renderer.render(&source, ratio, lang, &text, &out_path) {
                Ok(variant) => result.variants.push(variant),
                Err(e) => {
                    warn!(
                        product = %product.name,
                        ratio = ratio.label(),
                        lang,
                        error = %e,
                        "variant render failed"
                    );
                    result.variant_failures.push(VariantFailure {
                        aspect_ratio: ratio,
                        language: lang.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    info!(
        product = %product.name,
        variants = result.variants.len(),
        failures = result.variant_failures.len(),
        reused = hit,
        "product processed"
    );
    result
}

/// Generation closure handed to the asset cache: one provider call,
/// source image written under the assets directory.
async fn generate_source(
    services: &Arc<PipelineServices>,
    product: &Product,
) -> Result<GeneratedAsset, GenerationError> {
    let prompt = services.prompts.build(DEFAULT_TEMPLATE, product);
    let request = services.generation.request(prompt);
    let image = services.generation.generate(&request).await?;

    let key = normalize_product_key(&product.name);
    let location = services.config.assets_dir.join(format!("{key}.png"));
    if let Some(parent) = location.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| GenerationError::Fatal(format!("assets dir: {e}")))?;
    }
    tokio::fs::write(&location, &image.bytes)
        .await
        .map_err(|e| GenerationError::Fatal(format!("source write: {e}")))?;

    Ok(GeneratedAsset {
        location,
        cost: image.cost,
    })
}
