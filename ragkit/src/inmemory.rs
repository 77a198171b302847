//! In-memory document store.
//!
//! This module provides [`InMemoryDocumentStore`], a document store backed by
//! a `BTreeMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and collections small enough for exact search.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::store::{DocumentStore, Snapshot};

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<String, Arc<Document>>,
    dimension: Option<usize>,
}

/// An in-memory [`DocumentStore`].
///
/// Documents are kept behind `Arc` and replaced wholesale on upsert, so a
/// concurrent reader sees either the old or the new version of a document,
/// never a mix. Readers share the lock; writers are exclusive.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::{DocumentStore, InMemoryDocumentStore};
///
/// let store = InMemoryDocumentStore::with_dimension(384);
/// store.upsert(embedded_documents).await?;
/// assert_eq!(store.len().await?, embedded_documents_len);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<Inner>,
    fixed_dimension: bool,
}

impl InMemoryDocumentStore {
    /// Create an empty store whose dimension is set by the first upsert.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that only accepts embeddings of `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Inner { documents: BTreeMap::new(), dimension: Some(dimension) }),
            fixed_dimension: true,
        }
    }
}

/// Validate a whole batch against the current dimension, returning the
/// dimension the store will have once the batch is committed.
fn validate_batch(documents: &[Document], current: Option<usize>) -> Result<Option<usize>> {
    let mut dimension = current;
    for document in documents {
        document.validate_shape()?;
        let embedding = document
            .embedding
            .as_ref()
            .ok_or_else(|| RagError::MissingEmbedding { id: document.id.clone() })?;
        match dimension {
            Some(expected) if expected != embedding.len() => {
                return Err(RagError::DimensionMismatch { expected, actual: embedding.len() });
            }
            Some(_) => {}
            None => dimension = Some(embedding.len()),
        }
    }
    Ok(dimension)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(&self, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        let dimension = validate_batch(&documents, inner.dimension).inspect_err(|e| {
            warn!(batch_size = documents.len(), error = %e, "rejected upsert batch");
        })?;
        inner.dimension = dimension;

        let count = documents.len();
        for document in documents {
            inner.documents.insert(document.id.clone(), Arc::new(document));
        }
        debug!(upserted = count, total = inner.documents.len(), "upserted documents");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Arc<Document>> {
        let inner = self.inner.read().await;
        inner.documents.get(id).cloned().ok_or_else(|| RagError::NotFound { id: id.to_string() })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.documents.remove(id) {
            Some(_) => {
                debug!(document.id = id, total = inner.documents.len(), "deleted document");
                Ok(())
            }
            None => Err(RagError::NotFound { id: id.to_string() }),
        }
    }

    async fn all(&self) -> Result<Snapshot> {
        let inner = self.inner.read().await;
        Ok(Snapshot::new(inner.documents.values().cloned().collect()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().await.documents.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.documents.clear();
        if !self.fixed_dimension {
            inner.dimension = None;
        }
        Ok(())
    }

    async fn dimension(&self) -> Option<usize> {
        self.inner.read().await.dimension
    }
}
