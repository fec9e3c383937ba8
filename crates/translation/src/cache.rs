//! Memory + durable translation cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use creative_core::brief::language_name;
use creative_core::config::TranslationConfig;
use creative_core::error::PipelineResult;
use creative_core::types::TranslationEntry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::provider::TranslationProvider;
use crate::TranslationError;

/// Source language of every campaign message.
const SOURCE_LANGUAGE: &str = "en";

/// Pause between provider retry attempts.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Result of one translation request.
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    pub text: String,
    pub cache_hit: bool,
    /// True when the provider failed and the source text was returned.
    pub fell_back: bool,
}

/// Maps (message, target language) to translated text, calling the
/// provider only on a miss and persisting results durably.
pub struct TranslationCache {
    memory: DashMap<(String, String), String>,
    cache_dir: PathBuf,
    provider: Arc<dyn TranslationProvider>,
    max_retries: u32,
}

impl TranslationCache {
    /// Construct the cache, loading durable entries from disk.
    pub async fn load(
        provider: Arc<dyn TranslationProvider>,
        config: &TranslationConfig,
    ) -> PipelineResult<Self> {
        let cache_dir = config.cache_dir.clone();
        tokio::fs::create_dir_all(&cache_dir).await?;

        let memory = DashMap::new();
        let mut dir = tokio::fs::read_dir(&cache_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.path().extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match tokio::fs::read_to_string(entry.path()).await {
                Ok(text) => match serde_json::from_str::<TranslationEntry>(&text) {
                    Ok(cached) => {
                        memory.insert(
                            (cached.source_hash, cached.target_language),
                            cached.translated_text,
                        );
                    }
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "skipping bad cache entry")
                    }
                },
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "unreadable cache entry")
                }
            }
        }
        info!(entries = memory.len(), "translation cache loaded");

        Ok(Self {
            memory,
            cache_dir,
            provider,
            max_retries: config.max_retries,
        })
    }

    /// Translate `text` into `lang`, consulting the cache first. On
    /// provider failure after retries, falls back to the source text.
    pub async fn translate(&self, text: &str, lang: &str) -> TranslationOutcome {
        if lang == SOURCE_LANGUAGE {
            return TranslationOutcome {
                text: text.to_string(),
                cache_hit: false,
                fell_back: false,
            };
        }

        let hash = hash_text(text);
        let key = (hash.clone(), lang.to_string());
        if let Some(cached) = self.memory.get(&key) {
            metrics::counter!("translation_cache_hits_total").increment(1);
            debug!(lang, "translation cache hit");
            return TranslationOutcome {
                text: cached.clone(),
                cache_hit: true,
                fell_back: false,
            };
        }

        let target_name = language_name(lang).unwrap_or(lang);
        match self.call_with_retries(text, target_name).await {
            Ok(translated) => {
                self.memory.insert(key, translated.clone());
                self.persist(text, &hash, lang, &translated).await;
                TranslationOutcome {
                    text: translated,
                    cache_hit: false,
                    fell_back: false,
                }
            }
            Err(e) => {
                metrics::counter!("translation_fallbacks_total").increment(1);
                warn!(lang, error = %e, "translation failed, falling back to source text");
                TranslationOutcome {
                    text: text.to_string(),
                    cache_hit: false,
                    fell_back: true,
                }
            }
        }
    }

    async fn call_with_retries(
        &self,
        text: &str,
        target_name: &str,
    ) -> Result<String, TranslationError> {
        let attempts = self.max_retries.max(1);
        let mut last = TranslationError::Provider("no attempts made".into());
        for attempt in 0..attempts {
            match self.provider.translate(text, target_name).await {
                Ok(t) => return Ok(t),
                Err(e) => {
                    warn!(
                        provider = self.provider.name(),
                        attempt = attempt + 1,
                        error = %e,
                        "translation attempt failed"
                    );
                    last = e;
                    if attempt + 1 < attempts {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(last)
    }

    async fn persist(&self, source: &str, hash: &str, lang: &str, translated: &str) {
        let entry = TranslationEntry {
            source_hash: hash.to_string(),
            source_language: SOURCE_LANGUAGE.to_string(),
            target_language: lang.to_string(),
            source_text: source.to_string(),
            translated_text: translated.to_string(),
            fetched_at: Utc::now(),
        };
        let path = self.cache_dir.join(format!("{hash}_{lang}.json"));
        let write = async {
            let text = serde_json::to_string_pretty(&entry)?;
            tokio::fs::write(&path, text).await?;
            Ok::<(), creative_core::error::PipelineError>(())
        };
        if let Err(e) = write.await {
            // Memory cache still serves this entry for the process
            // lifetime.
            warn!(path = %path.display(), error = %e, "translation persist failed");
        }
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }
}

fn hash_text(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl TranslationProvider for CountingProvider {
        async fn translate(
            &self,
            text: &str,
            target_name: &str,
        ) -> Result<String, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TranslationError::Provider("unavailable".into()))
            } else {
                Ok(format!("[{target_name}] {text}"))
            }
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn config(dir: &std::path::Path) -> TranslationConfig {
        TranslationConfig {
            cache_dir: dir.to_path_buf(),
            max_retries: 2,
            ..TranslationConfig::default()
        }
    }

    // 1. Identical calls issue one provider call -----------------------------

    #[tokio::test]
    async fn test_second_identical_call_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::new(false);
        let cache = TranslationCache::load(provider.clone(), &config(dir.path()))
            .await
            .unwrap();

        let first = cache.translate("Light up your nights", "ja").await;
        assert!(!first.cache_hit);
        assert_eq!(first.text, "[Japanese] Light up your nights");

        let second = cache.translate("Light up your nights", "ja").await;
        assert!(second.cache_hit);
        assert_eq!(second.text, first.text);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_languages_are_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::new(false);
        let cache = TranslationCache::load(provider.clone(), &config(dir.path()))
            .await
            .unwrap();

        cache.translate("Hello", "ja").await;
        cache.translate("Hello", "de").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    // 2. Same-language short-circuit -----------------------------------------

    #[tokio::test]
    async fn test_source_language_never_calls_provider() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::new(false);
        let cache = TranslationCache::load(provider.clone(), &config(dir.path()))
            .await
            .unwrap();

        let outcome = cache.translate("Hello", "en").await;
        assert_eq!(outcome.text, "Hello");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    // 3. Fallback ------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_falls_back_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::new(true);
        let cache = TranslationCache::load(provider.clone(), &config(dir.path()))
            .await
            .unwrap();

        let outcome = cache.translate("Hello", "fr").await;
        assert!(outcome.fell_back);
        assert_eq!(outcome.text, "Hello");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        // Failures are not cached.
        assert!(cache.is_empty());
    }

    // 4. Durable cache survives reload ---------------------------------------

    #[tokio::test]
    async fn test_disk_cache_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        {
            let provider = CountingProvider::new(false);
            let cache = TranslationCache::load(provider, &config(dir.path()))
                .await
                .unwrap();
            cache.translate("Hello", "es").await;
        }

        let provider = CountingProvider::new(false);
        let cache = TranslationCache::load(provider.clone(), &config(dir.path()))
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        let outcome = cache.translate("Hello", "es").await;
        assert!(outcome.cache_hit);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
