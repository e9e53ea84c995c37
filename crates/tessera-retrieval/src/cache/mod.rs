//! Result caching for similarity retrieval.
//!
//! ## Architecture
//!
//! - **L1 Cache (DashMap)**: In-memory, per-instance
//! - **L2 Cache (Redis)**: Shared across instances
//!
//! If Redis is unavailable or disabled the backend runs L1-only.

pub mod backend;
pub mod key;

use std::time::Duration;

use async_trait::async_trait;

pub use backend::{CacheBackend, CacheStats, CachedEntry};
pub use key::{CacheKeyParts, CacheKeyScope, cache_key};

use crate::error::CacheError;

/// Key/value store with per-entry TTL.
///
/// Values are opaque bytes; a hit returns exactly what was stored.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}
