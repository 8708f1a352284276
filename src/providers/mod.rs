//! Capability interfaces for the external embedding and completion models.
//!
//! The rest of the crate consumes language models only through these traits;
//! [`rig`](crate::providers::rig) holds the production implementations and
//! [`MockEmbeddingProvider`] gives tests a deterministic stand-in.

pub mod rig;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;

/// Failure of an external model call, reported at the capability boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected or failed the request.
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// The provider is not configured (missing credentials).
    #[error("provider not configured: {0}")]
    NotConfigured(&'static str),
}

/// Text-to-vector embedding capability.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(ProviderError::Provider {
            provider: "embedding",
            message: "empty embedding batch response".to_string(),
        })
    }

    /// Discover the embedding dimension by embedding a probe string.
    async fn probe_dimension(&self) -> Result<usize, ProviderError> {
        Ok(self.embed_query("the").await?.len())
    }
}

/// One tool the completion model may call, described by a JSON schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments object.
    pub parameters: serde_json::Value,
}

/// Outcome of one completion turn: either a direct answer or a single tool
/// call the caller is expected to execute.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelTurn {
    Answer(String),
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
}

/// The typed shape requested from structured answer generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerPayload {
    /// Detailed answer to the user's question.
    pub response: String,
    /// Sources used to generate the answer, as complete URLs copied
    /// verbatim from the provided context.
    pub sources: Vec<String>,
}

/// Chat completion and structured generation capability.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one chat turn with the given tool set bound. The model may
    /// answer directly or request at most one tool call.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, ProviderError>;

    /// Generate a typed `{response, sources}` object from the prompt.
    async fn structured_answer(
        &self,
        preamble: &str,
        prompt: &str,
    ) -> Result<AnswerPayload, ProviderError>;

    /// Plain single-shot completion, used for the unstructured fallback and
    /// the brand review pass.
    async fn prompt(&self, preamble: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Deterministic embedding provider for tests and offline runs.
///
/// Vectors are derived from a hash of the input text, so identical inputs
/// always produce identical embeddings and distinct inputs almost always
/// differ.
#[derive(Clone, Debug, Default)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self { dimensions: 8 }
    }

    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vec(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..self.dimensions)
            .map(|i| {
                let bits = seed.rotate_left((i % 64) as u32 * 8) ^ ((i as u64) << 24);
                (bits as f32) / (u32::MAX as f32)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|text| self.hash_to_vec(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec!["Hello world".to_string(), "Goodbye world".to_string()];
        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn probe_dimension_matches_vectors() {
        let provider = MockEmbeddingProvider::with_dimensions(16);
        assert_eq!(provider.probe_dimension().await.unwrap(), 16);
    }
}
