//! Shared service bundle handed to every worker.
//!
//! Constructed once at orchestrator start; caches are flushed through
//! their own persistence on every write, so shutdown needs no separate
//! flush step.

use std::sync::Arc;

use creative_assets::{AssetCache, AssetRepository, FileAssetRepository};
use creative_core::config::AppConfig;
use creative_core::error::PipelineResult;
use creative_generation::{GenerationClient, ImageProvider, PromptLibrary};
use creative_render::VariantRenderer;
use creative_safety::ContentSafetyFilter;
use creative_translation::{TranslationCache, TranslationProvider};

pub struct PipelineServices {
    pub config: AppConfig,
    pub safety: ContentSafetyFilter,
    pub assets: AssetCache,
    pub generation: GenerationClient,
    pub prompts: PromptLibrary,
    pub renderer: VariantRenderer,
    pub translations: TranslationCache,
}

impl PipelineServices {
    /// Wire the full service set from configuration and the two
    /// external provider seams, with file-backed asset persistence.
    pub async fn build(
        config: AppConfig,
        image_provider: Arc<dyn ImageProvider>,
        translation_provider: Arc<dyn TranslationProvider>,
    ) -> PipelineResult<Arc<Self>> {
        let repository: Arc<dyn AssetRepository> =
            Arc::new(FileAssetRepository::new(config.assets_dir.clone()).await?);
        Self::build_with_repository(config, image_provider, translation_provider, repository).await
    }

    /// Same wiring with an explicit repository, for tests and
    /// ephemeral runs.
    pub async fn build_with_repository(
        config: AppConfig,
        image_provider: Arc<dyn ImageProvider>,
        translation_provider: Arc<dyn TranslationProvider>,
        repository: Arc<dyn AssetRepository>,
    ) -> PipelineResult<Arc<Self>> {
        let safety = ContentSafetyFilter::new(&config.safety)?;
        let assets = AssetCache::load(repository).await?;
        let generation = GenerationClient::new(image_provider, config.generation.clone());
        let prompts = PromptLibrary::new(&config.generation.prompt_template);
        let renderer = VariantRenderer::new(&config.brand);
        let translations = TranslationCache::load(translation_provider, &config.translation).await?;

        Ok(Arc::new(Self {
            config,
            safety,
            assets,
            generation,
            prompts,
            renderer,
            translations,
        }))
    }
}
