//! # RAG Streaming Example
//!
//! Answers a question with `RagPipeline::query_stream`, printing fragments as
//! they arrive, then continues the conversation with history.
//!
//! The `WordStreamGenerator` emits one word at a time with a small delay to
//! mimic a token stream. No API keys required.
//!
//! Run: `cargo run --example rag_stream`

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ragkit::{
    Document, EmbeddingProvider, GenerationProvider, GenerationRequest, InMemoryDocumentStore,
    Message, RagConfig, RagPipeline, TextStream,
};

struct MockEmbeddingProvider {
    dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> ragkit::Result<Vec<f32>> {
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
}

/// Streams a summary of the conversation one word at a time.
struct WordStreamGenerator;

impl WordStreamGenerator {
    fn answer(request: &GenerationRequest) -> String {
        let question = request.history.last().map(|m| m.content.as_str()).unwrap_or_default();
        let passages = request.system.matches(ragkit::CONTEXT_SEPARATOR).count() + 1;
        format!(
            "You asked \"{question}\" after {} earlier message(s) and I was given {passages} \
             passage(s) of context.",
            request.history.len().saturating_sub(1),
        )
    }
}

#[async_trait::async_trait]
impl GenerationProvider for WordStreamGenerator {
    async fn generate(&self, request: &GenerationRequest) -> ragkit::Result<String> {
        Ok(Self::answer(request))
    }

    async fn generate_stream(&self, request: GenerationRequest) -> ragkit::Result<TextStream> {
        let words: Vec<String> =
            Self::answer(&request).split_inclusive(' ').map(str::to_string).collect();
        Ok(Box::pin(delayed_words(words)))
    }

    fn name(&self) -> &str {
        "word-stream"
    }
}

fn delayed_words(words: Vec<String>) -> impl futures::Stream<Item = ragkit::Result<String>> + Send {
    futures::stream::iter(words).then(|word| async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(word)
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config =
        RagConfig::builder().top_k(2).generation_timeout(Duration::from_secs(5)).build()?;

    let pipeline = RagPipeline::builder()
        .config(config)
        .store(Arc::new(InMemoryDocumentStore::new()))
        .embedding_provider(Arc::new(MockEmbeddingProvider { dimensions: 32 }))
        .generation_provider(Arc::new(WordStreamGenerator))
        .build()?;

    pipeline
        .add_documents(vec![
            Document::new("tokio", "Tokio is an asynchronous runtime for Rust."),
            Document::new("streams", "A Stream yields values asynchronously, one at a time."),
            Document::new("channels", "Channels move values between concurrent tasks."),
        ])
        .await?;

    // -- 1. First question, streamed --------------------------------------
    let question = "What does a Stream yield?";
    let mut stream = pipeline.query_stream(question).await?;
    println!("Sources: {:?}", stream.source_documents.iter().map(|d| &d.id).collect::<Vec<_>>());

    let mut answer = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        print!("{fragment}");
        std::io::stdout().flush()?;
        answer.push_str(&fragment);
    }
    println!();

    // -- 2. Follow-up with history ----------------------------------------
    let history = vec![Message::user(question), Message::assistant(answer)];
    let mut stream = pipeline.query_stream_with_history("And what runs it?", &history).await?;

    // Stop after three fragments; dropping the stream cancels generation.
    let mut taken = 0;
    while let Some(fragment) = stream.next().await {
        print!("{}", fragment?);
        taken += 1;
        if taken == 3 {
            break;
        }
    }
    drop(stream);
    println!("...\n(stopped early)");

    Ok(())
}
