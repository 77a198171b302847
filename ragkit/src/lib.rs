//! # ragkit
//!
//! An in-process Retrieval-Augmented Generation core.
//!
//! ## Overview
//!
//! - [`InMemoryDocumentStore`] holds embedded [`Document`]s and enforces a
//!   single embedding dimension per store.
//! - [`ExactIndex`] ranks stored documents by cosine similarity with a
//!   deterministic tie-break on document ID.
//! - [`Retriever`] embeds a query through an [`EmbeddingProvider`] and looks
//!   it up in a [`SimilarityIndex`].
//! - [`RagPipeline`] ingests documents in batches and answers questions
//!   through a [`GenerationProvider`], blocking or streaming.
//!
//! Embedding and generation backends are injected as trait objects. The
//! `openai` feature adds OpenAI-compatible implementations of both.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragkit::{InMemoryDocumentStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::builder().top_k(3).build()?)
//!     .store(Arc::new(InMemoryDocumentStore::new()))
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! pipeline.add_documents(documents).await?;
//! let response = pipeline.query("What is ownership?").await?;
//! println!("{}", response.text);
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI-compatible embedding and chat providers (also Ollama) |

pub mod collections;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod inmemory;
pub mod pipeline;
pub mod retriever;
pub mod store;
pub mod vector;

#[cfg(feature = "openai")]
pub mod openai;

pub use collections::Collections;
pub use config::{EmbeddingProviderConfig, GenerationProviderConfig, RagConfig, RagConfigBuilder};
pub use document::{Document, Metadata, RankedResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{GenerationProvider, GenerationRequest, Message, Role, TextStream};
pub use index::{ExactIndex, SimilarityIndex};
pub use inmemory::InMemoryDocumentStore;
pub use pipeline::{
    IngestReport, QueryMetadata, QueryResponse, QueryStage, QueryStream, RagPipeline,
    RagPipelineBuilder,
};
pub use retriever::{CONTEXT_SEPARATOR, Retriever, format_context};
pub use store::{DocumentStore, Snapshot};
pub use vector::{Embedding, SimilarityMetric, cosine_similarity};

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatProvider, OpenAIEmbeddingProvider};
