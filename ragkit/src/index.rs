//! Similarity search over a document store.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::document::RankedResult;
use crate::error::{RagError, Result};
use crate::store::DocumentStore;
use crate::vector::{self, SimilarityMetric};

/// Ranks stored documents against a query embedding.
///
/// Results are ordered by descending score with ties broken by ascending
/// document ID, so identical inputs always produce identical output.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Return the `top_k` documents most similar to `query`.
    ///
    /// An empty store yields an empty result, not an error.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RankedResult>>;

    /// Like [`search`](SimilarityIndex::search), but fails with
    /// [`RagError::EmptyStore`] instead of returning no results.
    async fn search_non_empty(&self, query: &[f32], top_k: usize) -> Result<Vec<RankedResult>> {
        let results = self.search(query, top_k).await?;
        if results.is_empty() {
            return Err(RagError::EmptyStore);
        }
        Ok(results)
    }
}

/// Exact brute-force search: every query scores every stored document.
///
/// Costs O(n·d) per query and keeps no state between calls, so results are
/// always consistent with the store's current contents.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use ragkit::{ExactIndex, InMemoryDocumentStore, SimilarityIndex};
///
/// let store = Arc::new(InMemoryDocumentStore::new());
/// let index = ExactIndex::new(store.clone());
/// let top = index.search(&query_embedding, 5).await?;
/// ```
pub struct ExactIndex {
    store: Arc<dyn DocumentStore>,
    metric: SimilarityMetric,
}

impl ExactIndex {
    /// Create a cosine-similarity index over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, metric: SimilarityMetric::Cosine }
    }

    /// Use a different scoring metric.
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    /// The metric this index scores with.
    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}

/// Descending score, then ascending id.
fn rank_order(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.document.id.cmp(&b.document.id))
}

#[async_trait]
impl SimilarityIndex for ExactIndex {
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RankedResult>> {
        if top_k == 0 {
            return Err(RagError::Validation("top_k must be greater than zero".to_string()));
        }
        if !vector::is_finite(query) {
            return Err(RagError::Validation("query embedding has non-finite values".to_string()));
        }

        // A store that never held an embedding has nothing to compare against.
        let Some(dimension) = self.store.dimension().await else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RagError::DimensionMismatch { expected: dimension, actual: query.len() });
        }

        let snapshot = self.store.all().await?;
        let mut scored: Vec<RankedResult> = snapshot
            .iter()
            .filter_map(|document| {
                // The store may have been cleared and re-dimensioned since
                // `dimension()` was read.
                let embedding =
                    document.embedding.as_deref().filter(|e| e.len() == query.len())?;
                let score = self.metric.score(query, embedding);
                Some(RankedResult { document: Arc::clone(document), score })
            })
            .collect();

        if top_k < scored.len() {
            scored.select_nth_unstable_by(top_k - 1, rank_order);
            scored.truncate(top_k);
        }
        scored.sort_by(rank_order);

        debug!(candidates = snapshot.len(), returned = scored.len(), top_k, "similarity search");
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::inmemory::InMemoryDocumentStore;

    async fn index_with(docs: Vec<(&str, Vec<f32>)>) -> ExactIndex {
        let store = Arc::new(InMemoryDocumentStore::new());
        let docs = docs
            .into_iter()
            .map(|(id, emb)| Document::new(id, format!("content of {id}")).with_embedding(emb))
            .collect();
        store.upsert(docs).await.unwrap();
        ExactIndex::new(store)
    }

    fn ids(results: &[RankedResult]) -> Vec<&str> {
        results.iter().map(|r| r.document.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_search_returns_sorted() {
        let index = index_with(vec![
            ("far", vec![0.0, 1.0, 0.0]),
            ("close", vec![1.0, 0.0, 0.0]),
            ("medium", vec![0.5, 0.5, 0.0]),
        ])
        .await;

        let results = index.search(&[1.0, 0.0, 0.0], 3).await.unwrap();
        assert_eq!(ids(&results), vec!["close", "medium", "far"]);
    }

    #[tokio::test]
    async fn test_ties_break_by_ascending_id() {
        let index = index_with(vec![
            ("c", vec![1.0, 0.0]),
            ("a", vec![2.0, 0.0]),
            ("b", vec![0.5, 0.0]),
            ("d", vec![0.0, 1.0]),
        ])
        .await;

        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(ids(&results), vec!["a", "b"]);

        let results = index.search(&[1.0, 0.0], 4).await.unwrap();
        assert_eq!(ids(&results), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_top_k_larger_than_store() {
        let index = index_with(vec![("only", vec![1.0, 0.0])]).await;
        let results = index.search(&[1.0, 0.0], 100).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_top_k_is_rejected() {
        let index = index_with(vec![("only", vec![1.0, 0.0])]).await;
        assert!(matches!(index.search(&[1.0, 0.0], 0).await, Err(RagError::Validation(_))));
    }

    #[tokio::test]
    async fn test_zero_query_scores_zero() {
        let index = index_with(vec![("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]).await;
        let results = index.search(&[0.0, 0.0], 2).await.unwrap();
        assert!(results.iter().all(|r| r.score == 0.0));
        assert_eq!(ids(&results), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let index = ExactIndex::new(store);
        assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
        assert!(matches!(index.search_non_empty(&[1.0, 0.0], 5).await, Err(RagError::EmptyStore)));
    }

    #[tokio::test]
    async fn test_empty_store_with_fixed_dimension_checks_query() {
        let index = ExactIndex::new(Arc::new(InMemoryDocumentStore::with_dimension(2)));
        assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 5).await,
            Err(RagError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_dot_product_metric_ranks_by_magnitude() {
        let index = index_with(vec![("short", vec![1.0, 0.0]), ("long", vec![3.0, 0.0])])
            .await
            .with_metric(SimilarityMetric::DotProduct);

        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(ids(&results), vec!["long", "short"]);
        assert!((results[0].score - 3.0).abs() < 1e-6);
    }
}
