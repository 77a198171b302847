//! Data types for documents and search results.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RagError, Result};
use crate::vector::{self, Embedding};

/// Key-value metadata attached to a [`Document`] (source URL, chunk index, ...).
pub type Metadata = HashMap<String, Value>;

/// A unit of retrievable text with metadata and an optional embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier within a store.
    pub id: String,
    /// The text content of the document.
    pub content: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: Metadata,
    /// The vector embedding for this document's content, if already computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
}

impl Document {
    /// Create a document without metadata or embedding.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: Metadata::new(), embedding: None }
    }

    /// Attach an embedding.
    pub fn with_embedding(mut self, embedding: Embedding) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Insert a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the fields that do not depend on the store: non-empty id and
    /// content, finite embedding values.
    pub(crate) fn validate_shape(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(RagError::Validation("document id must not be empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(RagError::Validation(format!(
                "document '{}' has empty content",
                self.id
            )));
        }
        if let Some(embedding) = &self.embedding {
            if embedding.is_empty() {
                return Err(RagError::Validation(format!(
                    "document '{}' has a zero-length embedding",
                    self.id
                )));
            }
            if !vector::is_finite(embedding) {
                return Err(RagError::Validation(format!(
                    "document '{}' has non-finite embedding values",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

impl AsRef<Document> for Document {
    fn as_ref(&self) -> &Document {
        self
    }
}

/// A stored [`Document`] paired with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    /// The matching document.
    pub document: Arc<Document>,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_helpers_fill_fields() {
        let doc = Document::new("a", "alpha")
            .with_metadata("source", "https://example.com")
            .with_metadata("chunk_index", 3)
            .with_embedding(vec![1.0, 0.0]);

        assert_eq!(doc.metadata["source"], Value::from("https://example.com"));
        assert_eq!(doc.metadata["chunk_index"], Value::from(3));
        assert_eq!(doc.embedding.as_deref(), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn validate_shape_rejects_bad_documents() {
        assert!(Document::new("", "text").validate_shape().is_err());
        assert!(Document::new("a", "   ").validate_shape().is_err());
        assert!(Document::new("a", "text").with_embedding(vec![]).validate_shape().is_err());
        assert!(
            Document::new("a", "text").with_embedding(vec![f32::NAN]).validate_shape().is_err()
        );
        assert!(Document::new("a", "text").validate_shape().is_ok());
    }

    #[test]
    fn deserializes_without_optional_fields() {
        let doc: Document =
            serde_json::from_str(r#"{"id":"x","content":"hello"}"#).unwrap();
        assert!(doc.metadata.is_empty());
        assert!(doc.embedding.is_none());
    }
}
