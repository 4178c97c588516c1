//! In-memory cache for public reference lists.
//!
//! Categories, units, states and per-state cities change rarely and are read
//! on nearly every listing page, so they are cached with `moka` for five
//! minutes. Every admin write or import calls [`ReferenceCache::invalidate`].

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use harvest_market_core::StateId;

use crate::db::{ReferenceRepository, RepositoryError};
use crate::models::{Category, City, State, Unit};

const TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Categories,
    Units,
    States,
    Cities(StateId),
}

#[derive(Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Units(Arc<Vec<Unit>>),
    States(Arc<Vec<State>>),
    Cities(Arc<Vec<City>>),
}

/// Cache of reference data lists.
#[derive(Clone)]
pub struct ReferenceCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for ReferenceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(TTL)
            .build();
        Self { cache }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the list has to be loaded and the query fails.
    pub async fn categories(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(CacheValue::Categories(list)) = self.cache.get(&CacheKey::Categories).await {
            debug!("categories cache hit");
            return Ok(list);
        }
        let list = Arc::new(ReferenceRepository::new(pool).list_categories().await?);
        self.cache
            .insert(CacheKey::Categories, CacheValue::Categories(Arc::clone(&list)))
            .await;
        Ok(list)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the list has to be loaded and the query fails.
    pub async fn units(&self, pool: &PgPool) -> Result<Arc<Vec<Unit>>, RepositoryError> {
        if let Some(CacheValue::Units(list)) = self.cache.get(&CacheKey::Units).await {
            debug!("units cache hit");
            return Ok(list);
        }
        let list = Arc::new(ReferenceRepository::new(pool).list_units().await?);
        self.cache
            .insert(CacheKey::Units, CacheValue::Units(Arc::clone(&list)))
            .await;
        Ok(list)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the list has to be loaded and the query fails.
    pub async fn states(&self, pool: &PgPool) -> Result<Arc<Vec<State>>, RepositoryError> {
        if let Some(CacheValue::States(list)) = self.cache.get(&CacheKey::States).await {
            debug!("states cache hit");
            return Ok(list);
        }
        let list = Arc::new(ReferenceRepository::new(pool).list_states().await?);
        self.cache
            .insert(CacheKey::States, CacheValue::States(Arc::clone(&list)))
            .await;
        Ok(list)
    }

    /// Cities of one state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the list has to be loaded and the query fails.
    pub async fn cities(
        &self,
        pool: &PgPool,
        state_id: StateId,
    ) -> Result<Arc<Vec<City>>, RepositoryError> {
        let key = CacheKey::Cities(state_id);
        if let Some(CacheValue::Cities(list)) = self.cache.get(&key).await {
            debug!(state_id = %state_id, "cities cache hit");
            return Ok(list);
        }
        let list = Arc::new(ReferenceRepository::new(pool).list_cities(state_id).await?);
        self.cache
            .insert(key, CacheValue::Cities(Arc::clone(&list)))
            .await;
        Ok(list)
    }

    /// Drop every cached list.
    pub async fn invalidate(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("reference cache invalidated");
    }

    #[cfg(test)]
    async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidate_clears_entries() {
        let cache = ReferenceCache::new();
        cache
            .cache
            .insert(CacheKey::Units, CacheValue::Units(Arc::new(Vec::new())))
            .await;
        cache
            .cache
            .insert(
                CacheKey::Cities(StateId::new(1)),
                CacheValue::Cities(Arc::new(Vec::new())),
            )
            .await;
        assert_eq!(cache.len().await, 2);

        cache.invalidate().await;
        assert_eq!(cache.len().await, 0);
    }
}
