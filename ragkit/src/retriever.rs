//! Query embedding plus similarity lookup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::document::{Document, RankedResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::SimilarityIndex;
use crate::pipeline::{QueryStage, bounded};

/// Separator placed between document contents by [`format_context`].
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Join document contents into a single prompt-ready string.
///
/// Returns an empty string for an empty slice; callers decide what to do
/// when there is no context.
pub fn format_context<D: AsRef<Document>>(documents: &[D]) -> String {
    let contents: Vec<&str> = documents.iter().map(|d| d.as_ref().content.as_str()).collect();
    contents.join(CONTEXT_SEPARATOR)
}

/// Embeds a query through an [`EmbeddingProvider`] and looks it up in a
/// [`SimilarityIndex`].
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn SimilarityIndex>,
    timeout: Option<Duration>,
}

impl Retriever {
    /// Create a retriever from an embedding provider and an index.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn SimilarityIndex>) -> Self {
        Self { embedder, index, timeout: None }
    }

    /// Bound the embedding call. An elapsed timeout fails with
    /// [`RagError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Return a reference to the similarity index.
    pub fn index(&self) -> &Arc<dyn SimilarityIndex> {
        &self.index
    }

    /// Embed a single query string.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] for a blank query.
    /// - [`RagError::EmbeddingFailure`] if the provider fails or does not
    ///   return exactly one vector.
    /// - [`RagError::Timeout`] if the configured timeout elapses.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }

        let provider = self.embedder.name();
        let texts = [query];
        let call = self.embedder.embed_batch(&texts);
        let mut vectors = bounded(QueryStage::Embedding, self.timeout, call)
            .await
            .map_err(|e| e.into_embedding_failure(provider))
            .inspect_err(|e| error!(provider, error = %e, "query embedding failed"))?;

        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            n => {
                error!(provider, returned = n, "expected exactly one query embedding");
                Err(RagError::embedding(
                    provider,
                    format!("expected 1 embedding for the query, got {n}"),
                ))
            }
        }
    }

    /// Retrieve the `top_k` most similar documents together with their scores.
    pub async fn retrieve_ranked(&self, query: &str, top_k: usize) -> Result<Vec<RankedResult>> {
        let embedding = self.embed_query(query).await?;
        let results = self.index.search(&embedding, top_k).await?;
        debug!(top_k, returned = results.len(), "retrieved documents");
        Ok(results)
    }

    /// Retrieve the `top_k` most similar documents, in rank order.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Arc<Document>>> {
        Ok(self.retrieve_ranked(query, top_k).await?.into_iter().map(|r| r.document).collect())
    }

    /// Join document contents with [`CONTEXT_SEPARATOR`].
    pub fn format_context<D: AsRef<Document>>(documents: &[D]) -> String {
        format_context(documents)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::index::ExactIndex;
    use crate::inmemory::InMemoryDocumentStore;
    use crate::store::DocumentStore;

    /// Maps a few known words onto axis-aligned vectors.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                t if t.contains("rust") => vec![1.0, 0.0],
                t if t.contains("python") => vec![0.0, 1.0],
                _ => vec![0.7, 0.7],
            })
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct EmptyEmbedder;

    #[async_trait]
    impl EmbeddingProvider for EmptyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![])
        }

        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![])
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "empty"
        }
    }

    async fn retriever(embedder: Arc<dyn EmbeddingProvider>) -> Retriever {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .upsert(vec![
                Document::new("rust", "Rust has ownership.").with_embedding(vec![1.0, 0.0]),
                Document::new("python", "Python has a GIL.").with_embedding(vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        Retriever::new(embedder, Arc::new(ExactIndex::new(store)))
    }

    #[test]
    fn format_context_empty_is_empty() {
        let docs: Vec<Document> = vec![];
        assert_eq!(format_context(&docs), "");
    }

    #[test]
    fn format_context_joins_with_separator() {
        let docs =
            vec![Arc::new(Document::new("1", "first")), Arc::new(Document::new("2", "second"))];
        assert_eq!(format_context(&docs), "first\n\n---\n\nsecond");
    }

    #[tokio::test]
    async fn retrieve_keeps_rank_order() {
        let retriever = retriever(Arc::new(KeywordEmbedder)).await;
        let docs = retriever.retrieve("tell me about python", 2).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["python", "rust"]);
    }

    #[tokio::test]
    async fn blank_query_is_validation_error() {
        let retriever = retriever(Arc::new(KeywordEmbedder)).await;
        assert!(matches!(retriever.retrieve("  ", 2).await, Err(RagError::Validation(_))));
    }

    #[tokio::test]
    async fn zero_vectors_is_embedding_failure() {
        let retriever = retriever(Arc::new(EmptyEmbedder)).await;
        let err = retriever.retrieve("rust", 2).await.unwrap_err();
        assert!(
            matches!(err, RagError::EmbeddingFailure { ref provider, .. } if provider == "empty")
        );
    }
}
