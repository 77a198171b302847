//! Named collections of document stores.
//!
//! Each collection is an independent [`DocumentStore`] with its own
//! dimension. Searching a collection means searching its store; nothing
//! filters across collections inside the index.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::{RagError, Result};
use crate::inmemory::InMemoryDocumentStore;
use crate::store::DocumentStore;

/// A registry mapping collection names to document stores.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::Collections;
///
/// let collections = Collections::new();
/// let faq = collections.create("faq", Some(384)).await;
/// faq.upsert(documents).await?;
/// ```
#[derive(Default)]
pub struct Collections {
    stores: RwLock<HashMap<String, Arc<dyn DocumentStore>>>,
}

impl Collections {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory collection. Returns the existing store if the name
    /// is already taken.
    pub async fn create(&self, name: &str, dimension: Option<usize>) -> Arc<dyn DocumentStore> {
        let mut stores = self.stores.write().await;
        stores
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(collection = name, ?dimension, "created collection");
                match dimension {
                    Some(dimension) => Arc::new(InMemoryDocumentStore::with_dimension(dimension)),
                    None => Arc::new(InMemoryDocumentStore::new()),
                }
            })
            .clone()
    }

    /// Register an externally constructed store, replacing any previous one.
    pub async fn insert(&self, name: &str, store: Arc<dyn DocumentStore>) {
        self.stores.write().await.insert(name.to_string(), store);
    }

    /// Look up a collection by name.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn DocumentStore>> {
        self.stores
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RagError::CollectionNotFound { name: name.to_string() })
    }

    /// Remove a collection and drop the registry's handle to its store.
    pub async fn remove(&self, name: &str) -> Result<()> {
        match self.stores.write().await.remove(name) {
            Some(_) => {
                info!(collection = name, "removed collection");
                Ok(())
            }
            None => Err(RagError::CollectionNotFound { name: name.to_string() }),
        }
    }

    /// Names of all registered collections, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
