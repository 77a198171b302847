//! Generation provider trait for producing answers from a prompt.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A lazy, finite, single-consumer stream of generated text fragments.
///
/// Dropping the stream cancels the underlying generation.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Everything a generation backend needs for one completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The system prompt, already filled with retrieved context.
    pub system: String,
    /// Prior turns followed by the new user message.
    pub history: Vec<Message>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A provider that turns a [`GenerationRequest`] into text.
///
/// The default [`generate_stream`](GenerationProvider::generate_stream)
/// yields the result of [`generate`](GenerationProvider::generate) as a single
/// fragment; backends with native streaming should override it.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a complete response.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Generate a response as a stream of text fragments.
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream> {
        let text = self.generate(&request).await?;
        Ok(Box::pin(stream::once(async move { Ok::<_, RagError>(text) })))
    }

    /// A short name used in error messages and logs.
    fn name(&self) -> &str {
        "custom"
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    struct Canned;

    #[async_trait]
    impl GenerationProvider for Canned {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            Ok(format!("{} turns", request.history.len()))
        }
    }

    #[tokio::test]
    async fn default_stream_yields_single_fragment() {
        let request = GenerationRequest {
            system: "sys".into(),
            history: vec![Message::user("hi")],
            max_tokens: 16,
            temperature: 0.0,
        };
        let fragments: Vec<_> = Canned.generate_stream(request).await.unwrap().collect().await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "1 turns");
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
