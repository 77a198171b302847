//! # RAG with OpenAI-compatible providers
//!
//! Builds the pipeline from serializable provider configs. By default it uses
//! OpenAI; set `RAGKIT_PROVIDER=ollama` to talk to a local Ollama server
//! instead (`nomic-embed-text` for embeddings, `llama3.2` for chat).
//!
//! Requires: `OPENAI_API_KEY` unless `RAGKIT_PROVIDER=ollama`.
//!
//! Run: `cargo run --example rag_openai --features openai`

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ragkit::{
    Document, EmbeddingProviderConfig, GenerationProviderConfig, InMemoryDocumentStore, RagConfig,
    RagPipeline,
};
use serde_json::json;
use tracing::info;

fn provider_configs() -> anyhow::Result<(EmbeddingProviderConfig, GenerationProviderConfig)> {
    match std::env::var("RAGKIT_PROVIDER").as_deref() {
        Ok("ollama") => {
            let embedding = serde_json::from_value(json!({
                "provider": "ollama",
                "model": "nomic-embed-text",
                "dimensions": 768
            }))?;
            let generation =
                serde_json::from_value(json!({ "provider": "ollama", "model": "llama3.2" }))?;
            Ok((embedding, generation))
        }
        _ => Ok((
            EmbeddingProviderConfig::openai_from_env()?,
            GenerationProviderConfig::openai_from_env()?,
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let (embedding, generation) = provider_configs()?;
    let embedder = embedding.build()?;
    let generator = generation.build()?;
    info!(
        embedding = embedder.name(),
        dimensions = embedder.dimensions(),
        generation = generator.name(),
        "providers ready"
    );

    let config = RagConfig::builder()
        .top_k(2)
        .temperature(0.2)
        .embedding_timeout(Duration::from_secs(30))
        .generation_timeout(Duration::from_secs(60))
        .build()?;

    let pipeline = RagPipeline::builder()
        .config(config)
        .store(Arc::new(InMemoryDocumentStore::new()))
        .embedding_provider(embedder)
        .generation_provider(generator)
        .build()?;

    pipeline
        .add_documents(vec![
            Document::new(
                "ownership",
                "Each value in Rust has a single owner. When the owner goes out of scope, \
                 the value is dropped.",
            ),
            Document::new(
                "borrowing",
                "References borrow a value without taking ownership. You may have either one \
                 mutable reference or any number of shared references at a time.",
            ),
            Document::new(
                "traits",
                "Traits define shared behavior. A type implements a trait by providing its \
                 required methods.",
            ),
        ])
        .await?;

    let response = pipeline.query("When is a value dropped?").await?;
    println!("{}\n", response.text);
    println!("{}", serde_json::to_string_pretty(&response.metadata)?);

    println!("\nStreaming:");
    let mut stream = pipeline.query_stream("How many mutable references can I hold?").await?;
    while let Some(fragment) = stream.next().await {
        print!("{}", fragment?);
    }
    println!();

    Ok(())
}
