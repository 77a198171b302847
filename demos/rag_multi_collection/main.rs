//! # RAG Multi-Collection Example
//!
//! A support assistant that keeps product docs and troubleshooting notes in
//! separate collections. Each collection gets its own pipeline; a simple
//! keyword router picks which one answers a question.
//!
//! No API keys required.
//!
//! Run: `cargo run --example rag_multi_collection`

use std::collections::HashMap;
use std::sync::Arc;

use ragkit::{
    Collections, Document, EmbeddingProvider, GenerationProvider, GenerationRequest, RagConfig,
    RagError, RagPipeline,
};

const DIMENSIONS: usize = 64;

struct MockEmbeddingProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> ragkit::Result<Vec<f32>> {
        let mut emb = vec![0.0f32; DIMENSIONS];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % DIMENSIONS as u64) as usize] += 1.0;
        }
        ragkit::vector::normalize(&mut emb);
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Reports how much context it was given instead of calling a model.
struct ContextSizeGenerator;

#[async_trait::async_trait]
impl GenerationProvider for ContextSizeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> ragkit::Result<String> {
        let passages = request.system.matches(ragkit::CONTEXT_SEPARATOR).count() + 1;
        Ok(format!("(answer drawn from {passages} passage(s))"))
    }
}

fn product_docs() -> Vec<Document> {
    vec![
        Document::new(
            "getting_started",
            "To get started with CloudSync, create an account and install the CLI. \
             Authenticate by running cloudsync login, then initialize a project with \
             cloudsync init in your repository root.",
        )
        .with_metadata("section", "getting_started"),
        Document::new(
            "sync_config",
            "The cloudsync.yaml file controls sync behavior. sync_interval sets how often \
             files are synced and ignore_patterns lists files to skip.",
        )
        .with_metadata("section", "configuration"),
        Document::new(
            "teams",
            "CloudSync Teams allows shared workspaces. Invite members with cloudsync team \
             invite. Roles are admin, editor and viewer.",
        )
        .with_metadata("section", "teams"),
    ]
}

fn troubleshooting_docs() -> Vec<Document> {
    vec![
        Document::new(
            "sync_stuck",
            "Problem: sync is stuck at uploading. Cause: a large file or a network timeout. \
             Fix: check cloudsync status and add the file to ignore_patterns.",
        )
        .with_metadata("issue", "sync_stuck"),
        Document::new(
            "auth_expired",
            "Problem: authentication expired error. Cause: tokens expire after inactivity. \
             Fix: run cloudsync login to authenticate again.",
        )
        .with_metadata("issue", "auth_expired"),
    ]
}

fn route(question: &str) -> &'static str {
    let lower = question.to_lowercase();
    if ["error", "stuck", "fail", "problem"].iter().any(|w| lower.contains(w)) {
        "troubleshooting"
    } else {
        "docs"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider);
    let generator: Arc<dyn GenerationProvider> = Arc::new(ContextSizeGenerator);
    let collections = Collections::new();

    // -- 1. One pipeline per collection -----------------------------------
    let mut pipelines = HashMap::new();
    for (name, documents) in [("docs", product_docs()), ("troubleshooting", troubleshooting_docs())]
    {
        let store = collections.create(name, Some(DIMENSIONS)).await;
        let pipeline = RagPipeline::builder()
            .config(RagConfig::builder().top_k(2).build()?)
            .store(store)
            .embedding_provider(embedder.clone())
            .generation_provider(generator.clone())
            .build()?;
        let report = pipeline.add_documents(documents).await?;
        println!("{name}: {} document(s)", report.documents);
        pipelines.insert(name, pipeline);
    }
    println!("Collections: {:?}", collections.names().await);

    // -- 2. Route questions -----------------------------------------------
    let questions = [
        "How do I invite members to my team?",
        "My sync is stuck uploading, what should I do?",
        "I get an authentication error when running commands",
    ];
    for question in questions {
        let collection = route(question);
        let response = pipelines[&collection].query(question).await?;
        let sources: Vec<&str> = response.source_documents.iter().map(|d| d.id.as_str()).collect();
        println!("\n[{collection}] {question}\n  sources: {sources:?}\n  {}", response.text);
    }

    // -- 3. Unknown collections are an error, not an empty result ---------
    match collections.get("changelog").await {
        Err(RagError::CollectionNotFound { name }) => println!("\nNo collection named '{name}'"),
        Err(e) => return Err(e.into()),
        Ok(_) => println!("\nchangelog exists"),
    }

    Ok(())
}
