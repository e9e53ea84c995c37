//! Retrieval configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [retrieval]
//! cache_ttl = "5m"
//! cache_cleanup_interval = "1m"
//! cache_key_scope = "subject"
//! default_top_k = 5
//!
//! [retrieval.redis]
//! enabled = true
//! url = "redis://localhost:6379"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheKeyScope;

/// Retrieval coordinator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Lifetime of a cached result set.
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub cache_ttl: Duration,

    /// How often expired entries are purged from the in-process cache tier.
    #[serde(with = "humantime_serde", default = "default_cleanup_interval")]
    pub cache_cleanup_interval: Duration,

    /// Master switch for the result cache.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Which request fields identify a cached result set.
    #[serde(default)]
    pub cache_key_scope: CacheKeyScope,

    /// `top_k` used when a request does not give one.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Upper bound for `top_k`.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Namespace of cache keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Shared L2 cache.
    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    100
}

fn default_key_prefix() -> String {
    "vector".to_string()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cache_ttl: default_cache_ttl(),
            cache_cleanup_interval: default_cleanup_interval(),
            cache_enabled: true,
            cache_key_scope: CacheKeyScope::default(),
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            key_prefix: default_key_prefix(),
            redis: RedisConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Invalid("cache_ttl must be > 0".into()));
        }
        if self.cache_cleanup_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "cache_cleanup_interval must be > 0".into(),
            ));
        }
        if self.max_top_k == 0 {
            return Err(ConfigError::Invalid("max_top_k must be > 0".into()));
        }
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(ConfigError::Invalid(format!(
                "default_top_k must be between 1 and max_top_k ({})",
                self.max_top_k
            )));
        }
        if self.key_prefix.is_empty() || self.key_prefix.contains(':') {
            return Err(ConfigError::Invalid(
                "key_prefix must be non-empty and must not contain ':'".into(),
            ));
        }
        if self.redis.enabled && self.redis.url.is_empty() {
            return Err(ConfigError::Invalid(
                "redis.url is required when redis is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Clamp a requested `top_k` into `1..=max_top_k`.
    #[must_use]
    pub fn effective_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_top_k)
            .clamp(1, self.max_top_k.max(1))
    }
}

/// Redis configuration for the shared L2 cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Enable Redis. Without it the cache is local to the process.
    #[serde(default)]
    pub enabled: bool,

    /// Connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid retrieval configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.cache_cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.cache_key_scope, CacheKeyScope::Subject);
        assert_eq!(config.key_prefix, "vector");
        assert!(!config.redis.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_humantime_ttl() {
        let config: RetrievalConfig =
            serde_json::from_str(r#"{ "cache_ttl": "90s", "cache_key_scope": "query" }"#).unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(90));
        assert_eq!(config.cache_key_scope, CacheKeyScope::Query);
        assert_eq!(config.default_top_k, 5);
    }

    #[test]
    fn test_effective_top_k() {
        let config = RetrievalConfig::default();
        assert_eq!(config.effective_top_k(None), 5);
        assert_eq!(config.effective_top_k(Some(0)), 1);
        assert_eq!(config.effective_top_k(Some(12)), 12);
        assert_eq!(config.effective_top_k(Some(10_000)), 100);
    }

    #[test]
    fn test_validate() {
        let config = RetrievalConfig {
            default_top_k: 200,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            key_prefix: "a:b".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            cache_ttl: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            cache_cleanup_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
