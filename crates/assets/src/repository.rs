//! Persistence seam for asset records.
//!
//! The cache core is indifferent to whether records land in a JSON
//! metadata document or a real store; tests use the in-memory variant.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use creative_core::error::PipelineResult;
use creative_core::types::AssetRecord;
use dashmap::DashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// All records known to the store.
    async fn load_all(&self) -> PipelineResult<Vec<AssetRecord>>;

    /// Insert or replace the record for its key.
    async fn upsert(&self, record: &AssetRecord) -> PipelineResult<()>;
}

/// Records persisted as one JSON metadata document next to the asset
/// files, keyed by normalized product identity.
pub struct FileAssetRepository {
    metadata_path: PathBuf,
    // Serializes read-modify-write cycles on the document.
    write_lock: Mutex<()>,
}

impl FileAssetRepository {
    pub async fn new(assets_dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let assets_dir = assets_dir.into();
        tokio::fs::create_dir_all(&assets_dir).await?;
        Ok(Self {
            metadata_path: assets_dir.join("asset_metadata.json"),
            write_lock: Mutex::new(()),
        })
    }

    async fn read_document(&self) -> PipelineResult<HashMap<String, AssetRecord>> {
        match tokio::fs::read_to_string(&self.metadata_path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AssetRepository for FileAssetRepository {
    async fn load_all(&self) -> PipelineResult<Vec<AssetRecord>> {
        let document = self.read_document().await?;
        Ok(document.into_values().collect())
    }

    async fn upsert(&self, record: &AssetRecord) -> PipelineResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        document.insert(record.key.clone(), record.clone());
        let text = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&self.metadata_path, text).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryAssetRepository {
    records: DashMap<String, AssetRecord>,
}

impl MemoryAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the cache.
    pub fn insert(&self, record: AssetRecord) {
        self.records.insert(record.key.clone(), record);
    }
}

#[async_trait]
impl AssetRepository for MemoryAssetRepository {
    async fn load_all(&self) -> PipelineResult<Vec<AssetRecord>> {
        Ok(self.records.iter().map(|e| e.value().clone()).collect())
    }

    async fn upsert(&self, record: &AssetRecord) -> PipelineResult<()> {
        self.records.insert(record.key.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use creative_core::types::AssetOrigin;

    fn record(key: &str) -> AssetRecord {
        AssetRecord {
            key: key.to_string(),
            product_name: key.to_string(),
            location: PathBuf::from(format!("{key}.png")),
            origin: AssetOrigin::Generated,
            cost: 0.04,
            created_at: Utc::now(),
            usage_count: 0,
        }
    }

    #[tokio::test]
    async fn test_file_repository_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileAssetRepository::new(dir.path()).await.unwrap();

        assert!(repo.load_all().await.unwrap().is_empty());

        repo.upsert(&record("solar_lamp")).await.unwrap();
        let mut updated = record("solar_lamp");
        updated.usage_count = 3;
        repo.upsert(&updated).await.unwrap();
        repo.upsert(&record("trail_pack")).await.unwrap();

        let records = repo.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        let lamp = records.iter().find(|r| r.key == "solar_lamp").unwrap();
        assert_eq!(lamp.usage_count, 3);
    }

    #[tokio::test]
    async fn test_file_repository_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = FileAssetRepository::new(dir.path()).await.unwrap();
            repo.upsert(&record("solar_lamp")).await.unwrap();
        }
        let repo = FileAssetRepository::new(dir.path()).await.unwrap();
        assert_eq!(repo.load_all().await.unwrap().len(), 1);
    }
}
