//! Configuration for the RAG pipeline and its providers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The default system prompt. `{context}` and `{question}` are substituted
/// at query time.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the question using \
only the context below. If the context does not contain the answer, say so.\n\n\
Context:\n{context}\n\nQuestion: {question}";

/// Substituted for the context when retrieval returns nothing and
/// [`RagConfig::require_context`] is `false`.
pub const DEFAULT_NO_CONTEXT_MESSAGE: &str = "No relevant documents were found.";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Number of top results to retrieve per query.
    pub top_k: usize,
    /// Number of documents embedded per provider call during ingestion.
    pub batch_size: usize,
    /// Number of ingestion batches embedded concurrently.
    pub ingest_concurrency: usize,
    /// Minimum similarity score for results. `None` keeps every result.
    pub similarity_threshold: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature passed to the generation provider.
    pub temperature: f32,
    /// System prompt template containing `{context}` and `{question}`.
    pub system_prompt: String,
    /// Fail queries with [`RagError::EmptyStore`] when nothing is retrieved.
    pub require_context: bool,
    /// Context used in place of retrieved documents when there are none.
    pub no_context_message: String,
    /// Timeout for each embedding call.
    pub embedding_timeout: Option<Duration>,
    /// Timeout for the generation call, and for each streamed fragment.
    pub generation_timeout: Option<Duration>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            batch_size: 100,
            ingest_concurrency: 1,
            similarity_threshold: None,
            max_tokens: 1024,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            require_context: true,
            no_context_message: DEFAULT_NO_CONTEXT_MESSAGE.to_string(),
            embedding_timeout: None,
            generation_timeout: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `top_k`, `batch_size`, `ingest_concurrency` or `max_tokens` is zero
    /// - `temperature` is outside `0.0..=2.0`
    /// - `similarity_threshold` is not finite
    /// - `system_prompt` lacks a `{context}` or `{question}` placeholder
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.batch_size == 0 {
            return Err(RagError::Config("batch_size must be greater than zero".to_string()));
        }
        if self.ingest_concurrency == 0 {
            return Err(RagError::Config(
                "ingest_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(RagError::Config("max_tokens must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            )));
        }
        if self.similarity_threshold.is_some_and(|t| !t.is_finite()) {
            return Err(RagError::Config("similarity_threshold must be finite".to_string()));
        }
        for placeholder in ["{context}", "{question}"] {
            if !self.system_prompt.contains(placeholder) {
                return Err(RagError::Config(format!(
                    "system_prompt must contain a {placeholder} placeholder"
                )));
            }
        }
        Ok(())
    }

    /// Fill the system prompt template.
    pub fn render_system_prompt(&self, context: &str, question: &str) -> String {
        self.system_prompt.replace("{context}", context).replace("{question}", question)
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of top results to retrieve per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of documents embedded per provider call.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set how many ingestion batches may be embedded at once.
    pub fn ingest_concurrency(mut self, width: usize) -> Self {
        self.config.ingest_concurrency = width;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the maximum number of generated tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the system prompt template.
    pub fn system_prompt(mut self, template: impl Into<String>) -> Self {
        self.config.system_prompt = template.into();
        self
    }

    /// Choose whether an empty retrieval fails the query.
    pub fn require_context(mut self, require: bool) -> Self {
        self.config.require_context = require;
        self
    }

    /// Set the context used when nothing is retrieved.
    pub fn no_context_message(mut self, message: impl Into<String>) -> Self {
        self.config.no_context_message = message.into();
        self
    }

    /// Bound each embedding call.
    pub fn embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding_timeout = Some(timeout);
        self
    }

    /// Bound the generation call and each streamed fragment.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout = Some(timeout);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

fn default_openai_base_url() -> String {
    OPENAI_BASE_URL.to_string()
}

fn default_ollama_base_url() -> String {
    OLLAMA_BASE_URL.to_string()
}

fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_openai_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RagError::Config(format!("{field} must not be empty")));
    }
    Ok(())
}

fn openai_key_from_env() -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| RagError::Config("OPENAI_API_KEY environment variable not set".to_string()))
}

/// Selects and configures an embedding backend.
///
/// Each variant carries only the fields its backend needs.
///
/// ```rust,ignore
/// let config: EmbeddingProviderConfig = serde_json::from_value(json!({
///     "provider": "openai",
///     "api_key": "sk-...",
///     "dimensions": 512
/// }))?;
/// config.validate()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbeddingProviderConfig {
    /// The OpenAI embeddings API.
    #[serde(rename = "openai")]
    OpenAI {
        api_key: String,
        #[serde(default = "default_openai_embedding_model")]
        model: String,
        /// Matryoshka truncation; also the dimension reported to the store.
        #[serde(default)]
        dimensions: Option<usize>,
        #[serde(default = "default_openai_base_url")]
        base_url: String,
    },
    /// A local Ollama server through its OpenAI-compatible endpoint.
    Ollama {
        model: String,
        dimensions: usize,
        #[serde(default = "default_ollama_base_url")]
        base_url: String,
    },
}

impl EmbeddingProviderConfig {
    /// OpenAI with the default model, reading `OPENAI_API_KEY`.
    pub fn openai_from_env() -> Result<Self> {
        Ok(Self::OpenAI {
            api_key: openai_key_from_env()?,
            model: default_openai_embedding_model(),
            dimensions: None,
            base_url: default_openai_base_url(),
        })
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::OpenAI { api_key, model, dimensions, base_url } => {
                require_non_empty("api_key", api_key)?;
                require_non_empty("model", model)?;
                require_non_empty("base_url", base_url)?;
                if *dimensions == Some(0) {
                    return Err(RagError::Config("dimensions must be greater than zero".into()));
                }
            }
            Self::Ollama { model, dimensions, base_url } => {
                require_non_empty("model", model)?;
                require_non_empty("base_url", base_url)?;
                if *dimensions == 0 {
                    return Err(RagError::Config("dimensions must be greater than zero".into()));
                }
            }
        }
        Ok(())
    }
}

/// Selects and configures a chat-completion backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum GenerationProviderConfig {
    /// The OpenAI chat completions API.
    #[serde(rename = "openai")]
    OpenAI {
        api_key: String,
        #[serde(default = "default_openai_chat_model")]
        model: String,
        #[serde(default = "default_openai_base_url")]
        base_url: String,
    },
    /// A local Ollama server through its OpenAI-compatible endpoint.
    Ollama {
        model: String,
        #[serde(default = "default_ollama_base_url")]
        base_url: String,
    },
}

impl GenerationProviderConfig {
    /// OpenAI with the default model, reading `OPENAI_API_KEY`.
    pub fn openai_from_env() -> Result<Self> {
        Ok(Self::OpenAI {
            api_key: openai_key_from_env()?,
            model: default_openai_chat_model(),
            base_url: default_openai_base_url(),
        })
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::OpenAI { api_key, model, base_url } => {
                require_non_empty("api_key", api_key)?;
                require_non_empty("model", model)?;
                require_non_empty("base_url", base_url)
            }
            Self::Ollama { model, base_url } => {
                require_non_empty("model", model)?;
                require_non_empty("base_url", base_url)
            }
        }
    }
}
