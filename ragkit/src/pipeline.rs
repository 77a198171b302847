//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates ingestion (embed → store) and question
//! answering (embed → search → generate) by composing a [`DocumentStore`],
//! an [`EmbeddingProvider`], a [`GenerationProvider`] and a
//! [`SimilarityIndex`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit::{InMemoryDocumentStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .store(Arc::new(InMemoryDocumentStore::new()))
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! pipeline.add_documents(documents).await?;
//! let answer = pipeline.query("How does ownership work?").await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::document::{Document, RankedResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationProvider, GenerationRequest, Message, TextStream};
use crate::index::{ExactIndex, SimilarityIndex};
use crate::retriever::{Retriever, format_context};
use crate::store::DocumentStore;

/// The stages a query moves through. A failure at any stage ends the query
/// with an error whose [`RagError::stage`] names that stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    Received,
    Embedding,
    Retrieving,
    Generating,
    Completed,
}

/// Run `future`, failing with [`RagError::Timeout`] if `timeout` elapses first.
pub(crate) async fn bounded<T>(
    stage: QueryStage,
    timeout: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(after) => tokio::time::timeout(after, future)
            .await
            .map_err(|_| RagError::Timeout { stage, after })?,
        None => future.await,
    }
}

/// Logs stage transitions for a single query.
struct StageTracker {
    stage: QueryStage,
}

impl StageTracker {
    fn new() -> Self {
        Self { stage: QueryStage::Received }
    }

    fn advance(&mut self, next: QueryStage) {
        debug!(from = ?self.stage, to = ?next, "query stage");
        self.stage = next;
    }

    fn fail(&self, error: &RagError) {
        warn!(stage = ?self.stage, error = %error, "query failed");
    }
}

/// Summary of a successful [`RagPipeline::add_documents`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents committed to the store.
    pub documents: usize,
    /// Documents that were embedded by the pipeline (the rest arrived embedded).
    pub embedded: usize,
    /// Batches committed.
    pub batches: usize,
}

/// Details about how a [`QueryResponse`] was produced.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMetadata {
    pub request_id: Uuid,
    pub top_k: usize,
    /// Similarity scores of `source_documents`, in the same order.
    pub scores: Vec<f32>,
    pub context_chars: usize,
    pub elapsed_ms: u64,
}

/// The answer to a [`RagPipeline::query`] call.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub text: String,
    pub source_documents: Vec<Arc<Document>>,
    pub metadata: QueryMetadata,
}

/// A streamed answer. Retrieval has already completed; the generated text
/// arrives through the [`Stream`] implementation.
///
/// Dropping the value cancels the underlying generation call.
pub struct QueryStream {
    pub request_id: Uuid,
    pub source_documents: Vec<Arc<Document>>,
    pub scores: Vec<f32>,
    fragments: TextStream,
}

impl QueryStream {
    /// Consume the wrapper, keeping only the fragment stream.
    pub fn into_fragments(self) -> TextStream {
        self.fragments
    }
}

impl Stream for QueryStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.fragments.as_mut().poll_next(cx)
    }
}

/// Retrieval output shared by the blocking and streaming query paths.
struct Prepared {
    request: GenerationRequest,
    results: Vec<RankedResult>,
    context_chars: usize,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. A pipeline is `Send + Sync`
/// and is meant to be shared behind an `Arc` across concurrent requests.
pub struct RagPipeline {
    config: RagConfig,
    store: Arc<dyn DocumentStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generation_provider: Arc<dyn GenerationProvider>,
    retriever: Retriever,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the generation provider.
    pub fn generation_provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.generation_provider
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Embed documents that lack an embedding and upsert everything into the
    /// store, `batch_size` documents at a time.
    ///
    /// Up to `ingest_concurrency` batches are embedded at once, but batches
    /// are committed strictly in order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestionFailure`] naming the first batch that
    /// failed. All earlier batches stay committed; nothing is rolled back.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<IngestReport> {
        if documents.is_empty() {
            return Ok(IngestReport::default());
        }

        let total = documents.len();
        let batch_size = self.config.batch_size;
        let mut batches = Vec::with_capacity(total.div_ceil(batch_size));
        let mut remaining = documents.into_iter();
        loop {
            let batch: Vec<Document> = remaining.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batches.push(batch);
        }

        info!(documents = total, batches = batches.len(), "ingesting documents");

        let mut embedded_batches = stream::iter(batches.into_iter().enumerate())
            .map(move |(batch_index, batch)| async move {
                (batch_index, self.embed_missing(batch).await)
            })
            .buffered(self.config.ingest_concurrency);

        let mut report = IngestReport::default();
        while let Some((batch_index, result)) = embedded_batches.next().await {
            let (batch, embedded) = result.map_err(|e| ingestion_failure(batch_index, e))?;
            let count = batch.len();
            self.store.upsert(batch).await.map_err(|e| ingestion_failure(batch_index, e))?;

            report.documents += count;
            report.embedded += embedded;
            report.batches += 1;
            debug!(batch_index, documents = count, embedded, "committed batch");
        }

        info!(documents = report.documents, embedded = report.embedded, "ingestion completed");
        Ok(report)
    }

    /// Fill in embeddings for the documents of one batch that lack them.
    async fn embed_missing(&self, mut batch: Vec<Document>) -> Result<(Vec<Document>, usize)> {
        for document in &batch {
            document.validate_shape()?;
        }

        let missing: Vec<usize> = batch
            .iter()
            .enumerate()
            .filter(|(_, d)| d.embedding.is_none())
            .map(|(i, _)| i)
            .collect();
        if missing.is_empty() {
            return Ok((batch, 0));
        }

        let provider = self.embedding_provider.name();
        let embeddings = {
            let texts: Vec<&str> = missing.iter().map(|&i| batch[i].content.as_str()).collect();
            bounded(
                QueryStage::Embedding,
                self.config.embedding_timeout,
                self.embedding_provider.embed_batch(&texts),
            )
            .await
            .map_err(|e| e.into_embedding_failure(provider))?
        };

        if embeddings.len() != missing.len() {
            return Err(RagError::embedding(
                provider,
                format!("expected {} embeddings, got {}", missing.len(), embeddings.len()),
            ));
        }

        let embedded = missing.len();
        for (i, embedding) in missing.into_iter().zip(embeddings) {
            batch[i].embedding = Some(embedding);
        }
        Ok((batch, embedded))
    }

    /// Answer a question from retrieved context.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] for a blank question.
    /// - [`RagError::EmbeddingFailure`] / [`RagError::Timeout`] from the
    ///   query embedding.
    /// - [`RagError::EmptyStore`] if nothing was retrieved and
    ///   `require_context` is set.
    /// - [`RagError::GenerationFailure`] if the generation provider fails.
    pub async fn query(&self, question: &str) -> Result<QueryResponse> {
        self.query_with_history(question, &[]).await
    }

    /// Like [`query`](Self::query), continuing an existing conversation.
    pub async fn query_with_history(
        &self,
        question: &str,
        history: &[Message],
    ) -> Result<QueryResponse> {
        let request_id = Uuid::new_v4();
        let span = info_span!("query", %request_id);

        async move {
            let started = Instant::now();
            let mut tracker = StageTracker::new();
            let prepared = self.prepare(question, history, &mut tracker).await?;

            tracker.advance(QueryStage::Generating);
            let provider = self.generation_provider.name();
            let text = bounded(
                QueryStage::Generating,
                self.config.generation_timeout,
                self.generation_provider.generate(&prepared.request),
            )
            .await
            .map_err(|e| e.into_generation_failure(provider))
            .inspect_err(|e| tracker.fail(e))?;
            tracker.advance(QueryStage::Completed);

            let (source_documents, scores) = split_results(prepared.results);
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            info!(sources = source_documents.len(), elapsed_ms, "query completed");

            Ok(QueryResponse {
                text,
                source_documents,
                metadata: QueryMetadata {
                    request_id,
                    top_k: self.config.top_k,
                    scores,
                    context_chars: prepared.context_chars,
                    elapsed_ms,
                },
            })
        }
        .instrument(span)
        .await
    }

    /// Answer a question, streaming the generated text.
    ///
    /// Retrieval errors are returned directly. Generation errors that occur
    /// after the stream has started arrive as stream items.
    pub async fn query_stream(&self, question: &str) -> Result<QueryStream> {
        self.query_stream_with_history(question, &[]).await
    }

    /// Like [`query_stream`](Self::query_stream), continuing an existing
    /// conversation.
    pub async fn query_stream_with_history(
        &self,
        question: &str,
        history: &[Message],
    ) -> Result<QueryStream> {
        let request_id = Uuid::new_v4();
        let span = info_span!("query_stream", %request_id);

        async move {
            let mut tracker = StageTracker::new();
            let prepared = self.prepare(question, history, &mut tracker).await?;

            tracker.advance(QueryStage::Generating);
            let provider = self.generation_provider.name().to_string();
            let idle_timeout = self.config.generation_timeout;
            let inner = bounded(
                QueryStage::Generating,
                idle_timeout,
                self.generation_provider.generate_stream(prepared.request),
            )
            .await
            .map_err(|e| e.into_generation_failure(&provider))
            .inspect_err(|e| tracker.fail(e))?;

            let fragments = async_stream::stream! {
                let mut inner = inner;
                loop {
                    let next = match idle_timeout {
                        Some(after) => match tokio::time::timeout(after, inner.next()).await {
                            Ok(next) => next,
                            Err(_) => {
                                warn!(%request_id, ?after, "generation stream stalled");
                                let stage = QueryStage::Generating;
                                yield Err(RagError::Timeout { stage, after });
                                break;
                            }
                        },
                        None => inner.next().await,
                    };
                    match next {
                        Some(Ok(fragment)) => yield Ok(fragment),
                        Some(Err(e)) => {
                            let e = e.into_generation_failure(&provider);
                            error!(%request_id, error = %e, "generation stream failed");
                            yield Err(e);
                            break;
                        }
                        None => {
                            debug!(%request_id, "generation stream completed");
                            break;
                        }
                    }
                }
            };

            let (source_documents, scores) = split_results(prepared.results);
            Ok(QueryStream { request_id, source_documents, scores, fragments: Box::pin(fragments) })
        }
        .instrument(span)
        .await
    }

    /// Embed the question, search, and build the generation request.
    async fn prepare(
        &self,
        question: &str,
        history: &[Message],
        tracker: &mut StageTracker,
    ) -> Result<Prepared> {
        if question.trim().is_empty() {
            let e = RagError::Validation("question must not be empty".to_string());
            tracker.fail(&e);
            return Err(e);
        }

        tracker.advance(QueryStage::Embedding);
        let embedding =
            self.retriever.embed_query(question).await.inspect_err(|e| tracker.fail(e))?;

        tracker.advance(QueryStage::Retrieving);
        let mut results = self
            .retriever
            .index()
            .search(&embedding, self.config.top_k)
            .await
            .inspect_err(|e| tracker.fail(e))?;
        if let Some(threshold) = self.config.similarity_threshold {
            results.retain(|r| r.score >= threshold);
        }

        let context = if results.is_empty() {
            if self.config.require_context {
                let e = RagError::EmptyStore;
                tracker.fail(&e);
                return Err(e);
            }
            self.config.no_context_message.clone()
        } else {
            let documents: Vec<&Document> = results.iter().map(|r| r.document.as_ref()).collect();
            format_context(&documents)
        };
        debug!(retrieved = results.len(), context_chars = context.len(), "context assembled");

        let mut messages = history.to_vec();
        messages.push(Message::user(question));
        let request = GenerationRequest {
            system: self.config.render_system_prompt(&context, question),
            history: messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        Ok(Prepared { request, results, context_chars: context.len() })
    }
}

fn ingestion_failure(batch_index: usize, source: RagError) -> RagError {
    error!(batch_index, error = %source, "ingestion batch failed");
    RagError::IngestionFailure { batch_index, source: Box::new(source) }
}

fn split_results(results: Vec<RankedResult>) -> (Vec<Arc<Document>>, Vec<f32>) {
    results.into_iter().map(|r| (r.document, r.score)).unzip()
}

/// Builder for constructing a [`RagPipeline`].
///
/// All fields except `index` are required. Without an explicit index the
/// pipeline searches the store with an [`ExactIndex`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .store(Arc::new(InMemoryDocumentStore::new()))
///     .embedding_provider(Arc::new(embedder))
///     .generation_provider(Arc::new(llm))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<dyn DocumentStore>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    index: Option<Arc<dyn SimilarityIndex>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document store.
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Override the similarity index. It must search the same store.
    pub fn index(mut self, index: Arc<dyn SimilarityIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        config.validate()?;
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::Config("generation_provider is required".to_string()))?;

        let index = self.index.unwrap_or_else(|| Arc::new(ExactIndex::new(Arc::clone(&store))));
        let mut retriever = Retriever::new(Arc::clone(&embedding_provider), index);
        if let Some(timeout) = config.embedding_timeout {
            retriever = retriever.with_timeout(timeout);
        }

        Ok(RagPipeline { config, store, embedding_provider, generation_provider, retriever })
    }
}
