//! Language model trait for single-shot answer generation.

use async_trait::async_trait;

use crate::error::Result;

/// A remote language model invoked once per question, with no multi-turn
/// state.
///
/// A failed call surfaces as
/// [`RagError::Synthesis`](crate::RagError::Synthesis) and is never retried
/// automatically: a generation call is expensive and non-idempotent in
/// latency cost, so the caller decides whether to offer a manual retry.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Identifier of the underlying model, for logging and reporting.
    fn model_id(&self) -> &str;
}
