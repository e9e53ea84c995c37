//! Cache backend with L1 (DashMap) and L2 (Redis) tiers.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tokio::task::JoinHandle;

use crate::cache::ResultCache;
use crate::error::CacheError;

/// L1 size at which a write first purges expired entries.
const L1_PURGE_THRESHOLD: usize = 10_000;

/// A cached entry with TTL support.
///
/// The data is wrapped in `Arc` so that L1 hits do not copy the payload.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Create a new cached entry.
    #[must_use]
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Two-tier result cache: L1 (DashMap) + L2 (Redis).
///
/// ## Cache Modes
///
/// - **Local**: Single-instance mode using only DashMap
/// - **Redis**: Multi-instance mode with DashMap (L1) + Redis (L2)
///
/// Entries are never invalidated explicitly; they only expire. Expired L1
/// entries are dropped when read, by [`CacheBackend::start_cleanup_task`], and
/// by any write that finds L1 at `L1_PURGE_THRESHOLD` entries. An L2 hit is
/// promoted into L1 with the TTL Redis still reports for it, so a promoted
/// entry never outlives its L2 original.
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, CachedEntry>>),

    /// Multi-instance: Redis + local L1
    Redis {
        redis: Pool,
        local: Arc<DashMap<String, CachedEntry>>,
    },
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    #[must_use]
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend.
    #[must_use]
    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis {
            redis: redis_pool,
            local: Arc::new(DashMap::new()),
        }
    }

    fn local(&self) -> &Arc<DashMap<String, CachedEntry>> {
        match self {
            CacheBackend::Local(map) => map,
            CacheBackend::Redis { local, .. } => local,
        }
    }

    /// Look up `key` in L1, dropping it if expired.
    fn get_local(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let local = self.local();
        if let Some(entry) = local.get(key) {
            if !entry.is_expired() {
                return Some(Arc::clone(&entry.data));
            }
            drop(entry);
            local.remove(key);
        }
        None
    }

    /// Get a value from the cache.
    ///
    /// ## Lookup Order
    ///
    /// 1. Check L1 (DashMap)
    /// 2. Check L2 (Redis), promoting a hit into L1
    ///
    /// # Errors
    ///
    /// Returns an error if Redis cannot be reached or the command fails.
    pub async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        if let Some(data) = self.get_local(key) {
            tracing::debug!(key = %key, "cache hit (L1)");
            return Ok(Some(data));
        }

        let CacheBackend::Redis { redis, local } = self else {
            tracing::debug!(key = %key, "cache miss");
            return Ok(None);
        };

        let mut conn = redis.get().await?;
        let (data, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
            .get(key)
            .pttl(key)
            .query_async(&mut conn)
            .await?;

        let Some(data) = data else {
            tracing::debug!(key = %key, "cache miss");
            return Ok(None);
        };

        tracing::debug!(key = %key, "cache hit (L2)");
        let entry = CachedEntry::new(data, Duration::from_millis(pttl.max(0).unsigned_abs()));
        let data = Arc::clone(&entry.data);
        if pttl > 0 {
            local.insert(key.to_string(), entry);
        }
        Ok(Some(data))
    }

    /// Set a value in the cache with TTL.
    ///
    /// ## Write Strategy
    ///
    /// - **Local mode**: Write to DashMap only
    /// - **Redis mode**: Write to L1, then `SETEX` in L2
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis write fails. The L1 entry is kept.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        if self.local().len() >= L1_PURGE_THRESHOLD {
            let removed = self.purge_expired();
            tracing::debug!(removed = removed, "L1 cache purged on write");
        }

        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
                tracing::debug!(key = %key, "cache set (L1)");
                Ok(())
            }
            CacheBackend::Redis { redis, local } => {
                let entry = CachedEntry::new(value, ttl);
                let data = Arc::clone(&entry.data);
                local.insert(key.to_string(), entry);

                let ttl_secs = ttl.as_secs().max(1);
                let mut conn = redis.get().await?;
                conn.set_ex::<_, _, ()>(key, data.as_slice(), ttl_secs)
                    .await?;
                tracing::debug!(key = %key, ttl_secs = %ttl_secs, "cache set (L1+L2)");
                Ok(())
            }
        }
    }

    /// Drop expired L1 entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        purge_map(self.local())
    }

    /// Start background cleanup of expired L1 entries.
    ///
    /// The task ends on its own once every clone of this backend is dropped.
    /// Must be called from within a Tokio runtime.
    pub fn start_cleanup_task(&self, interval: Duration) -> JoinHandle<()> {
        let local: Weak<DashMap<String, CachedEntry>> = Arc::downgrade(self.local());

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(map) = local.upgrade() else {
                    break;
                };
                let removed = purge_map(&map);
                if removed > 0 {
                    tracing::debug!(removed = removed, "L1 cache cleanup completed");
                }
            }
        })
    }

    /// Get cache statistics (L1 only).
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        match self {
            CacheBackend::Local(map) => CacheStats {
                l1_entries: map.len(),
                mode: "local".to_string(),
            },
            CacheBackend::Redis { local, .. } => CacheStats {
                l1_entries: local.len(),
                mode: "redis".to_string(),
            },
        }
    }

    /// Check if Redis is available.
    pub async fn is_redis_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => false,
            CacheBackend::Redis { redis, .. } => redis.get().await.is_ok(),
        }
    }
}

#[async_trait]
impl ResultCache for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(CacheBackend::get(self, key)
            .await?
            .map(|data| data.as_ref().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        CacheBackend::set(self, key, value, ttl).await
    }
}

fn purge_map(map: &DashMap<String, CachedEntry>) -> usize {
    let before = map.len();
    map.retain(|_, entry| !entry.is_expired());
    before.saturating_sub(map.len())
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub l1_entries: usize,
    pub mode: String,
}
