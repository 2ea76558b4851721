//! Cache layer
//!
//! In-process cache for published listings and detail views.
//! Values are stored as JSON so any serializable type can be cached.

mod memory;

pub use memory::MemoryCache;

use crate::config::CacheConfig;
use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Shared cache handle used by the services
pub type Cache = MemoryCache;

/// Cache layer trait
///
/// Implementations must be safe to share between request handlers.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache, `None` on a miss
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store a value with the given TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration)
        -> Result<()>;

    /// Remove a single key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key matching a glob pattern (`*` and `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Remove everything
    async fn clear(&self) -> Result<()>;
}

/// Build the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_config() {
        let config = CacheConfig {
            ttl_seconds: 60,
            max_capacity: 100,
        };
        let cache = create_cache(&config);

        cache
            .set("blogs:fr:list:1", &vec![1, 2, 3], Duration::from_secs(60))
            .await
            .unwrap();
        let value: Option<Vec<i32>> = cache.get("blogs:fr:list:1").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }
}
