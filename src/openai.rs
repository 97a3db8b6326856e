//! OpenAI-compatible remote providers for embeddings and chat completion.
//!
//! This module is only available when the `openai` feature is enabled.
//! Both providers speak the plain HTTP API via `reqwest`, so any
//! OpenAI-compatible endpoint works by overriding the base URL.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::model::ChatModel;
use crate::retry::Backoff;

/// Default API base for both endpoints.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default dimensionality for `text-embedding-3-small`.
const DEFAULT_EMBED_DIMENSIONS: usize = 1536;

/// Default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Per-call ceiling for embedding requests.
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call ceiling for synthesis requests.
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default total attempts for a transient embedding failure.
const DEFAULT_EMBED_ATTEMPTS: usize = 5;

/// Whether an HTTP failure is worth retrying: rate limits, server
/// errors, and transport errors (timeouts included) are transient;
/// everything else (auth, bad request) is not.
fn is_transient(status: Option<reqwest::StatusCode>) -> bool {
    match status {
        Some(status) => status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        None => true,
    }
}

/// Extract a human-readable message from an OpenAI error body.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible
/// `/embeddings` endpoint.
///
/// Batches natively (many chunk texts per request) and retries transient
/// failures with bounded exponential backoff. After exhaustion the error
/// carries the offset of the failing input so ingestion can report which
/// chunks were lost.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    max_attempts: usize,
}

impl OpenAiEmbeddingProvider {
    /// Create a new provider with the given API key and default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("embedding API key must not be empty".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(EMBED_TIMEOUT)
                .build()
                .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: DEFAULT_EMBED_MODEL.to_string(),
            dimensions: DEFAULT_EMBED_DIMENSIONS,
            request_dimensions: None,
            max_attempts: DEFAULT_EMBED_ATTEMPTS,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Self::new(api_key)
    }

    /// Override the API base URL (for OpenAI-compatible services).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the embedding model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka truncation). Also updates
    /// the value reported by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Set the total attempts allowed per batch on transient failures.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// One request attempt; the bool says whether a retry is worthwhile.
    async fn embed_once(
        &self,
        texts: &[&str],
    ) -> std::result::Result<Vec<Vec<f32>>, (RagError, bool)> {
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
            embedding: Vec<f32>,
        }

        let embed_err =
            |message: String| RagError::Embedding { index: 0, message };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
                dimensions: self.request_dimensions,
            })
            .send()
            .await
            .map_err(|e| (embed_err(format!("request failed: {e}")), true))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err((
                embed_err(format!("API returned {status}: {}", error_detail(&body))),
                is_transient(Some(status)),
            ));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| (embed_err(format!("failed to parse response: {e}")), false))?;

        if parsed.data.len() != texts.len() {
            return Err((
                embed_err(format!(
                    "API returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    texts.len()
                )),
                false,
            ));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::Embedding {
            index: 0,
            message: "API returned empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(batch_size = texts.len(), model = %self.model, "embedding batch");

        let mut backoff = Backoff::new(self.max_attempts);
        loop {
            match self.embed_once(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err((err, transient)) => {
                    if !transient || !backoff.wait("embed").await {
                        error!(model = %self.model, error = %err, "embedding batch failed");
                        return Err(err);
                    }
                }
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Chat completion ────────────────────────────────────────────────

/// A [`ChatModel`] backed by an OpenAI-compatible `/chat/completions`
/// endpoint.
///
/// Calls are single-shot and never retried: a failure surfaces as
/// [`RagError::Synthesis`](crate::RagError::Synthesis) for the caller to
/// handle, typically by offering a manual retry.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatModel {
    /// Create a new chat model with the given API key and default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("chat API key must not be empty".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(CHAT_TIMEOUT)
                .build()
                .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 2000,
        })
    }

    /// Create a new chat model using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Self::new(api_key)
    }

    /// Override the API base URL (for OpenAI-compatible services).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: [Message<'a>; 1],
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }
        #[derive(Deserialize)]
        struct ResponseMessage {
            content: String,
        }

        debug!(model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: [Message { role: "user", content: prompt }],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .send()
            .await
            .map_err(|e| RagError::Synthesis(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(model = %self.model, %status, "chat API error");
            return Err(RagError::Synthesis(format!(
                "API returned {status}: {}",
                error_detail(&body)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::Synthesis(format!("failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RagError::Synthesis("API returned no choices".to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
