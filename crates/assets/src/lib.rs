//! Source-asset caching with single-flight generation.
//!
//! [`AssetCache`] maps a normalized product identity to a previously
//! generated source image. Concurrent misses on the same key collapse
//! into one generation call; this is the only piece of shared mutable
//! state in the pipeline that needs a lock discipline.

pub mod cache;
pub mod repository;

pub use cache::{AssetCache, GeneratedAsset};
pub use repository::{AssetRepository, FileAssetRepository, MemoryAssetRepository};
