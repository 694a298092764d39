//! Local catalog storage.
//!
//! `repo` holds the SQL; this module exposes the `CatalogStore` seam the sync
//! job writes through. Callers import from `catalog_sync::db`.

pub mod repo;

pub use repo::*;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::model::CatalogRecord;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 0 when the store is empty.
    async fn max_remote_id(&self) -> Result<i64>;

    /// Insert new codes, overwrite existing ones. All or nothing per call.
    async fn upsert_batch(&self, records: &[CatalogRecord]) -> Result<usize>;
}

#[async_trait]
impl CatalogStore for SqlitePool {
    async fn max_remote_id(&self) -> Result<i64> {
        Ok(repo::max_remote_id(self).await?)
    }

    async fn upsert_batch(&self, records: &[CatalogRecord]) -> Result<usize> {
        Ok(repo::upsert_products(self, records).await?)
    }
}
