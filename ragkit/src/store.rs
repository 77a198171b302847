//! Document store trait for holding embedded documents.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::Result;

/// A storage backend for embedded [`Document`]s.
///
/// Implementations own the documents they hold and enforce that every stored
/// embedding has the same dimension. IDs are unique; upserting an existing ID
/// replaces the previous document.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::{DocumentStore, InMemoryDocumentStore};
///
/// let store = InMemoryDocumentStore::new();
/// store.upsert(documents).await?;
/// let doc = store.get("intro").await?;
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace documents. Every document must carry an embedding.
    ///
    /// The batch is validated as a whole before anything is committed.
    async fn upsert(&self, documents: Vec<Document>) -> Result<()>;

    /// Look up a document by ID.
    async fn get(&self, id: &str) -> Result<Arc<Document>>;

    /// Remove a document by ID.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Take a point-in-time snapshot of all stored documents.
    async fn all(&self) -> Result<Snapshot>;

    /// Number of stored documents.
    async fn len(&self) -> Result<usize>;

    /// Returns `true` if the store holds no documents.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every document.
    async fn clear(&self) -> Result<()>;

    /// The embedding dimension established for this store, if any.
    async fn dimension(&self) -> Option<usize>;
}

/// A point-in-time view of a store's documents.
///
/// Cloning is cheap and iteration can be restarted any number of times;
/// mutations made to the store after the snapshot was taken are not visible.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    documents: Arc<[Arc<Document>]>,
}

impl Snapshot {
    pub(crate) fn new(documents: Vec<Arc<Document>>) -> Self {
        Self { documents: documents.into() }
    }

    /// Iterate over the captured documents.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Document>> {
        self.documents.iter()
    }

    /// Number of captured documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Arc<Document>;
    type IntoIter = std::slice::Iter<'a, Arc<Document>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
