//! Cache-aware retrieval coordinator.
//!
//! ```text
//! request ─► validate ─► cache? ──hit──────────────────────────────► items
//!                          │
//!                         miss ─► search ─► access filter ─► cache ─► items
//! ```
//!
//! A cache hit is returned verbatim, without re-filtering. The cached value is
//! always the post-filter result set, never raw provider output. Cache read
//! failures count as misses and write failures are logged; only provider
//! failures reach the caller.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_auth::{AccessibleContentRequest, Attributes, ContentItem, PolicyEvaluator};

use crate::cache::{CacheKeyParts, ResultCache, cache_key};
use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::search::{SearchFilters, SearchHit, SearchQuery, SimilaritySearch};

// =============================================================================
// Request / Response
// =============================================================================

/// Input of [`RetrievalCoordinator::get_similar_content`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalRequest {
    pub tenant_id: String,
    pub embedding: Vec<f32>,
    /// Falls back to the configured default and is clamped to `max_top_k`.
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub filters: SearchFilters,
    /// Recorded in the audit trail only.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_roles: BTreeSet<String>,
    #[serde(default)]
    pub attributes: Attributes,
    /// Falls back to the access control default permission.
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

/// One authorized, possibly masked, result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedContent {
    pub resource_type: String,
    pub resource_id: Option<String>,
    /// The search hit as a JSON object after masking.
    pub data: Value,
}

impl From<ContentItem> for RetrievedContent {
    fn from(item: ContentItem) -> Self {
        Self {
            resource_type: item.resource_type,
            resource_id: item.resource_id,
            data: item.data,
        }
    }
}

/// Output of [`RetrievalCoordinator::get_similar_content`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarContent {
    pub items: Vec<RetrievedContent>,
    pub cache_hit: bool,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Wraps a similarity provider with a read-through, post-filter cache.
#[derive(Clone)]
pub struct RetrievalCoordinator {
    search: Arc<dyn SimilaritySearch>,
    cache: Option<Arc<dyn ResultCache>>,
    evaluator: PolicyEvaluator,
    config: RetrievalConfig,
}

impl fmt::Debug for RetrievalCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalCoordinator")
            .field("has_cache", &self.cache.is_some())
            .field("evaluator", &self.evaluator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetrievalCoordinator {
    /// Create a coordinator without a cache.
    #[must_use]
    pub fn new(
        search: Arc<dyn SimilaritySearch>,
        evaluator: PolicyEvaluator,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            search,
            cache: None,
            evaluator,
            config,
        }
    }

    /// Attach a result cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Return the authorized results most similar to `request.embedding`.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::InvalidRequest`] if the tenant or embedding is missing
    /// - [`RetrievalError::VectorSearchFailed`] if the provider fails
    pub async fn get_similar_content(
        &self,
        request: &RetrievalRequest,
    ) -> Result<SimilarContent, RetrievalError> {
        validate(request)?;

        let top_k = self.config.effective_top_k(request.top_k);
        let permission = request
            .permission
            .clone()
            .unwrap_or_else(|| self.evaluator.config().default_permission.clone());

        let cache = self
            .cache
            .as_ref()
            .filter(|_| request.use_cache && self.config.cache_enabled);

        let key = match cache {
            Some(_) => self.key_for(request, top_k, &permission),
            None => None,
        };

        if let (Some(cache), Some(key)) = (cache, key.as_deref())
            && let Some(items) = read_cached(cache.as_ref(), key).await
        {
            return Ok(SimilarContent {
                items,
                cache_hit: true,
            });
        }

        let query = SearchQuery {
            tenant_id: request.tenant_id.clone(),
            embedding: request.embedding.clone(),
            top_k,
            filters: request.filters.clone(),
        };
        let hits = self.search.search(&query).await.map_err(|e| {
            tracing::error!(
                tenant_id = %request.tenant_id,
                error = %e,
                "Vector similarity search failed"
            );
            RetrievalError::VectorSearchFailed(e)
        })?;

        let items = self.filter_hits(request, &permission, hits).await;

        if let (Some(cache), Some(key)) = (cache, key.as_deref())
            && !items.is_empty()
        {
            self.write_cached(cache.as_ref(), key, &items).await;
        }

        Ok(SimilarContent {
            items,
            cache_hit: false,
        })
    }

    async fn filter_hits(
        &self,
        request: &RetrievalRequest,
        permission: &str,
        hits: Vec<SearchHit>,
    ) -> Vec<RetrievedContent> {
        if hits.is_empty() {
            return Vec::new();
        }

        let mut items = Vec::with_capacity(hits.len());
        for hit in hits {
            match hit_to_item(hit, &request.attributes) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(error = %e, "Dropping unencodable search hit"),
            }
        }

        self.evaluator
            .get_accessible_content(AccessibleContentRequest {
                tenant_id: request.tenant_id.clone(),
                user_id: request.user_id.clone(),
                user_roles: request.user_roles.clone(),
                permission: Some(permission.to_string()),
                items,
            })
            .await
            .into_iter()
            .map(RetrievedContent::from)
            .collect()
    }

    fn key_for(&self, request: &RetrievalRequest, top_k: usize, permission: &str) -> Option<String> {
        let parts = CacheKeyParts {
            tenant_id: &request.tenant_id,
            embedding: &request.embedding,
            top_k,
            filters: &request.filters,
            user_roles: &request.user_roles,
            attributes: &request.attributes,
            permission,
        };
        match cache_key(&self.config.key_prefix, self.config.cache_key_scope, &parts) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build vector cache key");
                None
            }
        }
    }

    async fn write_cached(&self, cache: &dyn ResultCache, key: &str, items: &[RetrievedContent]) {
        let bytes = match serde_json::to_vec(items) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Vector cache write failed");
                return;
            }
        };
        if let Err(e) = cache.set(key, bytes, self.config.cache_ttl).await {
            tracing::warn!(cache_key = %key, error = %e, "Vector cache write failed");
        }
    }
}

async fn read_cached(cache: &dyn ResultCache, key: &str) -> Option<Vec<RetrievedContent>> {
    let bytes = match cache.get(key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!(cache_key = %key, "Vector cache miss");
            return None;
        }
        Err(e) => {
            tracing::warn!(cache_key = %key, error = %e, "Vector cache read failed");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(items) => {
            tracing::debug!(cache_key = %key, "Vector cache hit");
            Some(items)
        }
        Err(e) => {
            tracing::warn!(cache_key = %key, error = %e, "Vector cache read failed");
            None
        }
    }
}

fn validate(request: &RetrievalRequest) -> Result<(), RetrievalError> {
    if request.tenant_id.trim().is_empty() {
        return Err(RetrievalError::invalid_request("tenant id is required"));
    }
    if request.embedding.is_empty() {
        return Err(RetrievalError::invalid_request("embedding vector is required"));
    }
    if request.embedding.iter().any(|v| !v.is_finite()) {
        return Err(RetrievalError::invalid_request(
            "embedding vector must contain only finite values",
        ));
    }
    Ok(())
}

/// Map a hit to a filter candidate.
///
/// `resource_id` is the hit's `content_id`, falling back to the hit id.
fn hit_to_item(hit: SearchHit, attributes: &Attributes) -> Result<ContentItem, serde_json::Error> {
    let resource_type = hit.content_type.clone();
    let resource_id = hit.content_id.clone().unwrap_or_else(|| hit.id.clone());
    let data = serde_json::to_value(hit)?;
    Ok(ContentItem {
        resource_type,
        resource_id: Some(resource_id),
        attributes: attributes.clone(),
        data,
    })
}
