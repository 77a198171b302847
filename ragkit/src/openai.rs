//! OpenAI-compatible embedding and chat providers.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! providers speak the OpenAI REST API, so they also work against compatible
//! servers such as Ollama.

use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{EmbeddingProviderConfig, GenerationProviderConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationProvider, GenerationRequest, Message, Role, TextStream};

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// Terminal payload of an OpenAI SSE stream.
const STREAM_DONE: &str = "[DONE]";

// ── Shared request plumbing ────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-success response into a readable message.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        Self::from_config(&EmbeddingProviderConfig::OpenAI {
            api_key,
            model: "text-embedding-3-small".into(),
            dimensions: None,
            base_url: "https://api.openai.com/v1".into(),
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::from_config(&EmbeddingProviderConfig::openai_from_env()?)
    }

    /// Create a provider from a validated configuration.
    pub fn from_config(config: &EmbeddingProviderConfig) -> Result<Self> {
        config.validate()?;
        let provider = match config {
            EmbeddingProviderConfig::OpenAI { api_key, model, dimensions, base_url } => Self {
                client: reqwest::Client::new(),
                api_key: Some(api_key.clone()),
                base_url: base_url.clone(),
                model: model.clone(),
                dimensions: dimensions.unwrap_or(DEFAULT_DIMENSIONS),
                request_dimensions: *dimensions,
            },
            EmbeddingProviderConfig::Ollama { model, dimensions, base_url } => Self {
                client: reqwest::Client::new(),
                api_key: None,
                base_url: base_url.clone(),
                model: model.clone(),
                dimensions: *dimensions,
                request_dimensions: None,
            },
        };
        Ok(provider)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding("OpenAI", "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = "OpenAI",
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };
        let mut request = self.client.post(endpoint(&self.base_url, "embeddings")).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "request failed");
            RagError::embedding("OpenAI", format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            error!(provider = "OpenAI", %message, "API error");
            return Err(RagError::embedding("OpenAI", message));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "failed to parse response");
            RagError::embedding("OpenAI", format!("failed to parse response: {e}"))
        })?;

        // The API documents `index`; don't rely on response order.
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`GenerationProvider`] backed by the OpenAI chat completions API.
///
/// Streaming uses server-sent events; dropping the returned stream closes
/// the HTTP connection.
pub struct OpenAIChatProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAIChatProvider {
    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::from_config(&GenerationProviderConfig::openai_from_env()?)
    }

    /// Create a provider from a validated configuration.
    pub fn from_config(config: &GenerationProviderConfig) -> Result<Self> {
        config.validate()?;
        let (api_key, base_url, model) = match config {
            GenerationProviderConfig::OpenAI { api_key, model, base_url } => {
                (Some(api_key.clone()), base_url.clone(), model.clone())
            }
            GenerationProviderConfig::Ollama { model, base_url } => {
                (None, base_url.clone(), model.clone())
            }
        };
        Ok(Self { client: reqwest::Client::new(), api_key, base_url, model })
    }

    fn request(&self, request: &GenerationRequest, stream: bool) -> reqwest::RequestBuilder {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(ChatMessage { role: Role::System, content: &request.system });
        messages.extend(request.history.iter().map(ChatMessage::from));

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        };
        let builder = self.client.post(endpoint(&self.base_url, "chat/completions")).json(&body);
        match &self.api_key {
            Some(api_key) => builder.bearer_auth(api_key),
            None => builder,
        }
    }

    async fn send(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response> {
        debug!(provider = "OpenAI", model = %self.model, stream, "chat completion");
        let response = self.request(request, stream).send().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "request failed");
            RagError::generation("OpenAI", format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            error!(provider = "OpenAI", %message, "API error");
            return Err(RagError::generation("OpenAI", message));
        }
        Ok(response)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

impl<'a> From<&'a Message> for ChatMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self { role: message.role, content: &message.content }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChatChunkChoice>,
}

#[derive(Deserialize)]
struct ChatChunkChoice {
    delta: ChatDelta,
}

#[derive(Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the text delta from one SSE `data:` payload.
fn parse_chunk(data: &str) -> Result<Option<String>> {
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| RagError::generation("OpenAI", format!("malformed stream chunk: {e}")))?;
    Ok(chunk.choices.into_iter().next().and_then(|c| c.delta.content).filter(|c| !c.is_empty()))
}

#[async_trait]
impl GenerationProvider for OpenAIChatProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let response = self.send(request, false).await?;
        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "failed to parse response");
            RagError::generation("OpenAI", format!("failed to parse response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::generation("OpenAI", "response contained no choices"))
    }

    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream> {
        let response = self.send(&request, true).await?;
        let mut events = response.bytes_stream().eventsource();

        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) if event.data == STREAM_DONE => break,
                    Ok(event) => match parse_chunk(&event.data) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            break;
                        }
                    },
                    Err(e) => {
                        yield Err(RagError::generation("OpenAI", format!("stream error: {e}")));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}

impl EmbeddingProviderConfig {
    /// Construct the configured embedding provider.
    pub fn build(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::new(OpenAIEmbeddingProvider::from_config(self)?))
    }
}

impl GenerationProviderConfig {
    /// Construct the configured generation provider.
    pub fn build(&self) -> Result<Arc<dyn GenerationProvider>> {
        Ok(Arc::new(OpenAIChatProvider::from_config(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chunk_extracts_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_chunk(data).unwrap().as_deref(), Some("Hel"));

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_chunk(role_only).unwrap(), None);

        assert!(parse_chunk("not json").is_err());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://localhost:11434/v1/", "embeddings"),
            "http://localhost:11434/v1/embeddings"
        );
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new(""), Err(RagError::Config(_))));
    }

    #[test]
    fn ollama_config_sets_dimensions_without_key() {
        let provider = OpenAIEmbeddingProvider::from_config(&EmbeddingProviderConfig::Ollama {
            model: "nomic-embed-text".into(),
            dimensions: 768,
            base_url: "http://localhost:11434/v1".into(),
        })
        .unwrap();
        assert_eq!(provider.dimensions(), 768);
        assert!(provider.api_key.is_none());
    }
}
