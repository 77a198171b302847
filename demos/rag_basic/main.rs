//! # RAG Basic Example
//!
//! Demonstrates the core pipeline: ingest documents, then answer questions
//! from the retrieved context.
//!
//! Uses `InMemoryDocumentStore`, a deterministic `MockEmbeddingProvider` and
//! an `ExtractiveGenerator` that quotes the best-matching context, so it runs
//! with **zero API keys**.
//!
//! Run: `cargo run --example rag_basic`

use std::sync::Arc;

use ragkit::{
    Document, EmbeddingProvider, GenerationProvider, GenerationRequest, InMemoryDocumentStore,
    RagConfig, RagPipeline,
};

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: deterministic hash-based embeddings for demos
// ---------------------------------------------------------------------------

struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> ragkit::Result<Vec<f32>> {
        // Bag of words: each word lands in a bucket chosen by its hash, so
        // texts sharing words point in similar directions.
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        ragkit::vector::normalize(&mut emb);
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// ExtractiveGenerator: answers with the first context passage
// ---------------------------------------------------------------------------

struct ExtractiveGenerator;

#[async_trait::async_trait]
impl GenerationProvider for ExtractiveGenerator {
    async fn generate(&self, request: &GenerationRequest) -> ragkit::Result<String> {
        let context = request
            .system
            .split_once("Context:\n")
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let best = context.split(ragkit::CONTEXT_SEPARATOR).next().unwrap_or_default();
        let best = best.split("\n\nQuestion:").next().unwrap_or_default();
        Ok(format!("According to the knowledge base: {}", best.trim()))
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // -- 1. Configure the pipeline ----------------------------------------
    // top_k=2 returns the two most relevant documents; batch_size=2 makes
    // ingestion visibly batched even for this small corpus.
    let config = RagConfig::builder().top_k(2).batch_size(2).build()?;

    // -- 2. Build the pipeline with in-memory components ------------------
    let pipeline = RagPipeline::builder()
        .config(config)
        .store(Arc::new(InMemoryDocumentStore::new()))
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(64)))
        .generation_provider(Arc::new(ExtractiveGenerator))
        .build()?;

    // -- 3. Ingest sample documents ---------------------------------------
    let documents = vec![
        Document::new(
            "rust",
            "Rust is a systems programming language focused on safety, speed, and \
             concurrency. It achieves memory safety without a garbage collector through \
             its ownership system.",
        )
        .with_metadata("topic", "rust"),
        Document::new(
            "python",
            "Python is a high-level, interpreted programming language known for its \
             readability. It is widely used in data science, web development, and automation.",
        )
        .with_metadata("topic", "python"),
        Document::new(
            "rag",
            "Retrieval-Augmented Generation combines a retrieval system with a language \
             model. Documents are embedded and stored in a vector index. At query time the \
             most relevant documents are retrieved and given to the model as context.",
        )
        .with_metadata("topic", "rag"),
    ];

    let report = pipeline.add_documents(documents).await?;
    println!(
        "Ingested {} documents in {} batch(es), {} embedded",
        report.documents, report.batches, report.embedded
    );

    // -- 4. Query the pipeline --------------------------------------------
    let questions =
        ["How does Rust achieve memory safety?", "Which language is used in data science?"];

    for question in &questions {
        println!("\nQuestion: \"{question}\"");
        let response = pipeline.query(question).await?;
        println!("Answer: {}", response.text);
        for (doc, score) in response.source_documents.iter().zip(&response.metadata.scores) {
            println!("  [score={score:.4}] {}", doc.id);
        }
        println!("Metadata: {}", serde_json::to_string(&response.metadata)?);
    }

    println!("\nDone.");
    Ok(())
}
