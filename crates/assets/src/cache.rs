//! Single-flight asset cache.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use creative_core::error::{GenerationError, PipelineResult};
use creative_core::types::{normalize_product_key, AssetOrigin, AssetRecord};
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::repository::AssetRepository;

/// What a generation closure hands back on success: where the source
/// image was written and what the provider call cost.
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    pub location: PathBuf,
    pub cost: f64,
}

type FlightResult = Result<(AssetRecord, bool), GenerationError>;

/// Maps normalized product identity to a previously generated source
/// image, generating on miss with at-most-one flight per key.
pub struct AssetCache {
    records: DashMap<String, AssetRecord>,
    inflight: DashMap<String, Arc<OnceCell<FlightResult>>>,
    repository: Arc<dyn AssetRepository>,
}

impl AssetCache {
    /// Construct the cache, loading known records from the repository.
    pub async fn load(repository: Arc<dyn AssetRepository>) -> PipelineResult<Self> {
        let records = DashMap::new();
        for record in repository.load_all().await? {
            records.insert(record.key.clone(), record);
        }
        info!(records = records.len(), "asset cache loaded");
        Ok(Self {
            records,
            inflight: DashMap::new(),
            repository,
        })
    }

    /// Look up the asset for `product_name`, generating it on miss.
    ///
    /// Returns the record and whether this was a cache hit. On a hit the
    /// usage counter is incremented and no external call is made. On a
    /// miss, concurrent callers for the same key park on the one
    /// in-flight generation and share its outcome; a failed flight is
    /// never cached, so a later call retries.
    pub async fn acquire<F, Fut>(
        &self,
        product_name: &str,
        generate: F,
    ) -> Result<(AssetRecord, bool), GenerationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<GeneratedAsset, GenerationError>> + Send,
    {
        let key = normalize_product_key(product_name);

        if self.records.contains_key(&key) {
            let record = self.mark_reused(&key).await;
            if let Some(record) = record {
                debug!(key = %key, usage = record.usage_count, "asset cache hit");
                return Ok((record, true));
            }
        }

        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let initiated = AtomicBool::new(false);
        let result = cell
            .get_or_init(|| {
                initiated.store(true, Ordering::SeqCst);
                self.run_flight(key.clone(), product_name.to_string(), generate())
            })
            .await
            .clone();

        // Success lands in `records`; failure must not linger as a
        // negative entry. Either way the flight slot is retired.
        self.inflight.remove_if(&key, |_, v| Arc::ptr_eq(v, &cell));

        match result {
            Ok((record, fresh)) => {
                if fresh && initiated.load(Ordering::SeqCst) {
                    Ok((record, false))
                } else {
                    // Parked caller, or the flight found the record
                    // already present: both are reuses.
                    let record = self.mark_reused(&record.key).await.unwrap_or(record);
                    Ok((record, true))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn run_flight<Fut>(&self, key: String, product_name: String, fut: Fut) -> FlightResult
    where
        Fut: Future<Output = Result<GeneratedAsset, GenerationError>> + Send,
    {
        // A racing flight may have completed between our miss check and
        // the cell creation.
        if let Some(existing) = self.records.get(&key) {
            return Ok((existing.clone(), false));
        }

        let generated = fut.await?;
        let record = AssetRecord {
            key: key.clone(),
            product_name,
            location: generated.location,
            origin: AssetOrigin::Generated,
            cost: generated.cost,
            created_at: Utc::now(),
            usage_count: 0,
        };
        self.records.insert(key.clone(), record.clone());
        self.persist(&record).await;
        info!(key = %key, cost = record.cost, "asset generated and cached");
        Ok((record, true))
    }

    /// Bump the usage counter and return the record tagged as a reuse.
    async fn mark_reused(&self, key: &str) -> Option<AssetRecord> {
        let updated = {
            let mut entry = self.records.get_mut(key)?;
            entry.usage_count += 1;
            entry.clone()
        };
        self.persist(&updated).await;
        let mut reused = updated;
        reused.origin = AssetOrigin::Reused;
        Some(reused)
    }

    async fn persist(&self, record: &AssetRecord) {
        if let Err(e) = self.repository.upsert(record).await {
            // The in-memory record stays authoritative; the next upsert
            // rewrites the full document.
            warn!(key = %record.key, error = %e, "asset record persist failed");
        }
    }

    /// Record for a product, if cached. Does not count as a use.
    pub fn peek(&self, product_name: &str) -> Option<AssetRecord> {
        self.records
            .get(&normalize_product_key(product_name))
            .map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
