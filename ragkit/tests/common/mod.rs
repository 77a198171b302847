//! Deterministic fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ragkit::{
    EmbeddingProvider, GenerationProvider, GenerationRequest, RagError, Result, TextStream,
};

/// Hash-based embeddings: identical text always maps to the same unit vector.
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut v = vec![0.0f32; self.dimensions];
        for (i, x) in v.iter_mut().enumerate() {
            *x = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        ragkit::vector::normalize(&mut v);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Maps text onto a 2-d vector by keyword: "rust" → x axis, "python" → y axis.
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        let x = if text.contains("rust") { 1.0 } else { 0.0 };
        let y = if text.contains("python") { 1.0 } else { 0.0 };
        Ok(if x == 0.0 && y == 0.0 { vec![-0.1, -0.2] } else { vec![x, y] })
    }

    fn dimensions(&self) -> usize {
        2
    }
}

/// Wraps another embedder and fails the `fail_on`-th batch call (zero-based).
pub struct FlakyEmbedder<E> {
    inner: E,
    fail_on: usize,
    calls: AtomicUsize,
}

impl<E> FlakyEmbedder<E> {
    pub fn new(inner: E, fail_on: usize) -> Self {
        Self { inner, fail_on, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<E: EmbeddingProvider> EmbeddingProvider for FlakyEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on {
            return Err(RagError::EmbeddingFailure {
                provider: "flaky".into(),
                message: "503 Service Unavailable".into(),
            });
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Wraps another embedder and sleeps before every batch call from the
/// `slow_from`-th onwards (zero-based).
pub struct SlowEmbedder<E> {
    inner: E,
    slow_from: usize,
    delay: Duration,
    calls: AtomicUsize,
}

impl<E> SlowEmbedder<E> {
    pub fn new(inner: E, slow_from: usize, delay: Duration) -> Self {
        Self { inner, slow_from, delay, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl<E: EmbeddingProvider> EmbeddingProvider for SlowEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.slow_from {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Answers with a fixed string and records every request it receives.
#[derive(Default)]
pub struct RecordingGenerator {
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingGenerator {
    pub fn last_request(&self) -> GenerationRequest {
        self.requests.lock().unwrap().last().cloned().expect("no generation request recorded")
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok("canned answer".to_string())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Always fails.
pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(RagError::GenerationFailure { provider: "failing".into(), message: "boom".into() })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Sleeps before answering.
pub struct SlowGenerator {
    pub delay: Duration,
}

#[async_trait]
impl GenerationProvider for SlowGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("late".to_string())
    }
}

/// Sets a flag when dropped.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Streams fixed fragments. With `hang_after` set, the stream stays pending
/// forever after its fragments instead of ending.
pub struct StreamingGenerator {
    pub fragments: Vec<&'static str>,
    pub hang_after: bool,
    pub dropped: Arc<AtomicBool>,
}

impl StreamingGenerator {
    pub fn new(fragments: Vec<&'static str>, hang_after: bool) -> Self {
        Self { fragments, hang_after, dropped: Arc::new(AtomicBool::new(false)) }
    }
}

#[async_trait]
impl GenerationProvider for StreamingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Ok(self.fragments.concat())
    }

    async fn generate_stream(&self, _request: GenerationRequest) -> Result<TextStream> {
        let guard = DropFlag(Arc::clone(&self.dropped));
        let items = stream::iter(self.fragments.clone()).map(move |f| {
            let _held = &guard;
            Ok::<_, RagError>(f.to_string())
        });
        if self.hang_after {
            Ok(Box::pin(items.chain(stream::pending())))
        } else {
            Ok(Box::pin(items))
        }
    }

    fn name(&self) -> &str {
        "streaming"
    }
}

/// Yields one fragment, then an error.
pub struct BrokenStreamGenerator;

#[async_trait]
impl GenerationProvider for BrokenStreamGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Ok(String::new())
    }

    async fn generate_stream(&self, _request: GenerationRequest) -> Result<TextStream> {
        Ok(Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(RagError::Validation("connection reset".into())),
        ])))
    }
}
