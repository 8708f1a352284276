//! Storage gateway for embedded chunks.
//!
//! This module provides a unified [`VectorStore`] trait that abstracts over
//! namespaced nearest-neighbor backends, so the crawl orchestrator and the
//! retrieval tool set can work with any supported index.
//!
//! # Supported backends
//!
//! - [`pinecone::PineconeStore`] - the production backend, speaking the
//!   Pinecone serverless REST API.
//! - [`memory::MemoryVectorStore`] - in-process cosine similarity store for
//!   tests and local experiments.

pub mod memory;
pub mod pinecone;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunker::TextChunk;
use crate::providers::ProviderError;

pub use memory::MemoryVectorStore;
pub use pinecone::PineconeStore;

/// Chunks are embedded and upserted in batches of this size to bound
/// request payloads.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Errors raised by vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Embedding the chunk or query text failed.
    #[error(transparent)]
    Embedding(#[from] ProviderError),

    /// Transport failure talking to the backing index.
    #[error("index transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backing index rejected a request.
    #[error("index error: {0}")]
    Backend(String),

    /// Malformed response from the backing index.
    #[error("unexpected index response: {0}")]
    Response(#[from] serde_json::Error),
}

/// One retrieval hit: chunk text, its metadata, and the similarity score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalMatch {
    pub text: String,
    pub metadata: serde_json::Value,
    pub score: f32,
}

impl RetrievalMatch {
    /// The source URL recorded in the match metadata, if any.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// Namespace-scoped vector index capability.
///
/// Implementations embed chunk text through the configured
/// [`EmbeddingProvider`](crate::providers::EmbeddingProvider) before
/// storage. Upserts have no partial-success contract: a failed batch fails
/// the whole `add_documents` call.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and upsert chunks into the given namespace.
    async fn add_documents(&self, chunks: &[TextChunk], namespace: &str)
    -> Result<(), StoreError>;

    /// Query a namespace for the `top_k` most similar chunks, ranked by
    /// descending similarity. `filter` restricts matches by metadata
    /// equality when provided.
    async fn query(
        &self,
        text: &str,
        namespace: &str,
        top_k: usize,
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<RetrievalMatch>, StoreError>;

    /// Delete a namespace and everything in it.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), StoreError>;

    /// List the namespaces currently present in the index.
    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError>;
}

/// Flatten a chunk into the metadata document stored alongside its vector:
/// the chunk metadata fields plus the text itself under `"text"`.
pub(crate) fn chunk_to_metadata(chunk: &TextChunk) -> Result<serde_json::Value, StoreError> {
    let mut metadata = serde_json::to_value(&chunk.metadata)?;
    if let Some(map) = metadata.as_object_mut() {
        map.insert(
            "text".to_string(),
            serde_json::Value::String(chunk.text.clone()),
        );
    }
    Ok(metadata)
}

/// Split the stored metadata document back into text and metadata.
pub(crate) fn metadata_to_match(mut metadata: serde_json::Value, score: f32) -> RetrievalMatch {
    let text = metadata
        .as_object_mut()
        .and_then(|map| map.remove("text"))
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    RetrievalMatch {
        text,
        metadata,
        score,
    }
}
