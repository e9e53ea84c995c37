//! Retrieval error types.

/// Errors returned by the retrieval coordinator.
///
/// Cache and serialization failures never appear here; the coordinator logs
/// them and degrades to an uncached search.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The similarity-search provider failed. No partial result is usable.
    #[error("Vector search failed: {0}")]
    VectorSearchFailed(#[source] SearchError),

    /// The request is malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },
}

impl RetrievalError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::VectorSearchFailed(_) => "VECTOR_SEARCH_FAILED",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
        }
    }
}

impl From<SearchError> for RetrievalError {
    fn from(e: SearchError) -> Self {
        Self::VectorSearchFailed(e)
    }
}

/// Error reported by a similarity-search provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SearchError {
    message: String,
}

impl SearchError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error reported by a result cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No connection could be obtained.
    #[error("connection unavailable: {0}")]
    Connection(String),

    /// A cache command failed.
    #[error("command failed: {0}")]
    Command(#[from] redis::RedisError),
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        Self::Connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = RetrievalError::from(SearchError::new("timeout"));
        assert_eq!(err.code(), "VECTOR_SEARCH_FAILED");
        assert_eq!(err.to_string(), "Vector search failed: timeout");

        let err = RetrievalError::invalid_request("tenant id is required");
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_search_error_display() {
        let err = SearchError::new("index unavailable");
        assert_eq!(err.to_string(), "index unavailable");
        assert_eq!(err.message(), "index unavailable");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::Connection("refused".into());
        assert_eq!(err.to_string(), "connection unavailable: refused");
    }
}
