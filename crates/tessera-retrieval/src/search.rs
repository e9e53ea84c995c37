//! Similarity-search provider interface.
//!
//! The coordinator treats a provider as an opaque ranked source. Ranking is
//! the provider's business; the coordinator only filters and caches.

use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::SearchError;

// =============================================================================
// Query and Hit
// =============================================================================

/// Equality filters applied by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

impl SearchFilters {
    /// Returns `true` if a chunk with these fields passes the filters.
    #[must_use]
    pub fn admits(&self, content_type: &str, content_id: Option<&str>) -> bool {
        self.content_type.as_deref().is_none_or(|t| t == content_type)
            && self
                .content_id
                .as_deref()
                .is_none_or(|id| Some(id) == content_id)
    }
}

/// A provider query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub tenant_id: String,
    pub embedding: Vec<f32>,
    pub top_k: usize,
    pub filters: SearchFilters,
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub content_id: Option<String>,
    pub content_type: String,
    #[serde(default)]
    pub content_text: String,
    #[serde(default)]
    pub chunk_index: Option<u32>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub score: Option<f64>,
    /// 1-based position in provider order.
    pub rank: usize,
}

/// Ranked similarity source.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return up to `query.top_k` hits for `query.tenant_id`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be queried.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError>;
}

// =============================================================================
// In-memory index
// =============================================================================

/// A stored chunk with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingChunk {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub content_id: Option<String>,
    pub content_type: String,
    #[serde(default)]
    pub content_text: String,
    #[serde(default)]
    pub chunk_index: Option<u32>,
    #[serde(default)]
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// Cosine-similarity index held in memory.
///
/// Chunks whose dimension differs from the query are skipped.
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    chunks: RwLock<Vec<EmbeddingChunk>>,
}

impl MemoryVectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_chunks(chunks: Vec<EmbeddingChunk>) -> Self {
        Self {
            chunks: RwLock::new(chunks),
        }
    }

    /// Parse a JSON array of chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an array of valid chunks.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::with_chunks(serde_json::from_str(document)?))
    }

    /// Load a JSON array of chunks from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let document = tokio::fs::read_to_string(path).await.map_err(|e| {
            SearchError::new(format!("failed to read corpus {}: {e}", path.display()))
        })?;
        let index = Self::from_json(&document)
            .map_err(|e| SearchError::new(format!("failed to parse corpus: {e}")))?;
        tracing::info!(path = %path.display(), chunks = index.len().await, "Loaded vector corpus");
        Ok(index)
    }

    pub async fn insert(&self, chunk: EmbeddingChunk) {
        self.chunks.write().await.push(chunk);
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

#[async_trait]
impl SimilaritySearch for MemoryVectorIndex {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
        let chunks = self.chunks.read().await;

        let mut scored: Vec<(f64, &EmbeddingChunk)> = chunks
            .iter()
            .filter(|c| c.tenant_id == query.tenant_id)
            .filter(|c| query.filters.admits(&c.content_type, c.content_id.as_deref()))
            .filter_map(|c| cosine_similarity(&query.embedding, &c.embedding).map(|s| (s, c)))
            .collect();

        // stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(query.top_k)
            .enumerate()
            .map(|(i, (score, chunk))| SearchHit {
                id: chunk.id.clone(),
                tenant_id: chunk.tenant_id.clone(),
                content_id: chunk.content_id.clone(),
                content_type: chunk.content_type.clone(),
                content_text: chunk.content_text.clone(),
                chunk_index: chunk.chunk_index,
                metadata: chunk.metadata.clone(),
                score: Some(score),
                rank: i + 1,
            })
            .collect())
    }
}

/// Cosine similarity, or `None` for mismatched dimensions or a zero vector.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::block_on;

    fn chunk(id: &str, tenant: &str, content_type: &str, embedding: Vec<f32>) -> EmbeddingChunk {
        EmbeddingChunk {
            id: id.into(),
            tenant_id: tenant.into(),
            content_id: Some(format!("{id}-content")),
            content_type: content_type.into(),
            content_text: format!("text of {id}"),
            chunk_index: Some(0),
            metadata: json!({}),
            embedding,
        }
    }

    fn query(embedding: Vec<f32>, top_k: usize, filters: SearchFilters) -> SearchQuery {
        SearchQuery {
            tenant_id: "tenant-123".into(),
            embedding,
            top_k,
            filters,
        }
    }

    fn index() -> MemoryVectorIndex {
        MemoryVectorIndex::with_chunks(vec![
            chunk("a", "tenant-123", "course", vec![1.0, 0.0]),
            chunk("b", "tenant-123", "course", vec![0.7, 0.7]),
            chunk("c", "tenant-123", "report", vec![0.0, 1.0]),
            chunk("d", "tenant-999", "course", vec![1.0, 0.0]),
            chunk("e", "tenant-123", "course", vec![1.0, 0.0, 0.0]),
        ])
    }

    #[tokio::test]
    async fn test_ranks_by_cosine_within_tenant() {
        let hits = index()
            .search(&query(vec![1.0, 0.0], 10, SearchFilters::default()))
            .await
            .unwrap();

        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[2].rank, 3);
        assert!((hits[0].score.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_top_k_and_filters() {
        let hits = index()
            .search(&query(vec![0.0, 1.0], 1, SearchFilters::default()))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c");

        let filters = SearchFilters {
            content_type: Some("course".into()),
            content_id: Some("b-content".into()),
        };
        let hits = index().search(&query(vec![0.0, 1.0], 5, filters)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn test_equal_scores_keep_insertion_order() {
        let index = MemoryVectorIndex::new();
        block_on(async {
            index.insert(chunk("first", "tenant-123", "course", vec![2.0, 0.0])).await;
            index.insert(chunk("second", "tenant-123", "course", vec![1.0, 0.0])).await;
            assert_eq!(index.len().await, 2);

            let hits = index
                .search(&query(vec![1.0, 0.0], 5, SearchFilters::default()))
                .await
                .unwrap();
            let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
            assert_eq!(ids, vec!["first", "second"]);
        });
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
    }

    #[test]
    fn test_filters_serialize_sparse() {
        assert_eq!(serde_json::to_value(SearchFilters::default()).unwrap(), json!({}));
        let filters = SearchFilters {
            content_type: Some("course".into()),
            content_id: None,
        };
        assert_eq!(serde_json::to_value(filters).unwrap(), json!({ "contentType": "course" }));
    }
}
