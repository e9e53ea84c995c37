//! # tessera-retrieval
//!
//! Permission-filtered similarity retrieval with a two-tier result cache.
//!
//! ## Modules
//!
//! - [`coordinator`] - read-through cache around search and access filtering
//! - [`search`] - similarity-search provider trait and in-memory index
//! - [`cache`] - L1/L2 cache backend and cache keys
//! - [`config`] - retrieval configuration
//! - [`error`] - error types

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod search;

use std::time::Duration;

pub use cache::{CacheBackend, CacheKeyScope, ResultCache};
pub use config::{RedisConfig, RetrievalConfig};
pub use coordinator::{RetrievalCoordinator, RetrievalRequest, RetrievedContent, SimilarContent};
pub use error::{CacheError, RetrievalError, SearchError};
pub use search::{
    EmbeddingChunk, MemoryVectorIndex, SearchFilters, SearchHit, SearchQuery, SimilaritySearch,
};

/// Create a cache backend based on configuration.
///
/// Falls back to a local-only backend when Redis is disabled, the pool cannot
/// be created, or the first connection fails.
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = Duration::from_millis(config.timeout_ms);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(|| deadpool_redis::PoolConfig::new(config.pool_size));
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return CacheBackend::new_local();
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            CacheBackend::new_redis(pool)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local cache."
            );
            CacheBackend::new_local()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_redis_uses_local() {
        let backend = create_cache_backend(&RedisConfig::default()).await;
        assert_eq!(backend.stats().mode, "local");
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back() {
        let config = RedisConfig {
            enabled: true,
            url: "redis://127.0.0.1:1".into(),
            pool_size: 1,
            timeout_ms: 200,
        };
        let backend = create_cache_backend(&config).await;
        assert_eq!(backend.stats().mode, "local");
    }
}
