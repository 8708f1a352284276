//! In-memory vector store backend.
//!
//! Cosine similarity over vectors held in a process-local map. Used by the
//! test suites and handy for local runs without index credentials; it
//! honors the same contract as the production backend, including batched
//! embedding and the no-partial-success rule.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    RetrievalMatch, StoreError, UPSERT_BATCH_SIZE, VectorStore, chunk_to_metadata,
    metadata_to_match,
};
use crate::chunker::TextChunk;
use crate::providers::EmbeddingProvider;

#[derive(Clone, Debug)]
struct StoredVector {
    metadata: serde_json::Value,
    vector: Vec<f32>,
}

/// Process-local [`VectorStore`] implementation.
pub struct MemoryVectorStore {
    embeddings: Arc<dyn EmbeddingProvider>,
    namespaces: RwLock<HashMap<String, Vec<StoredVector>>>,
}

impl MemoryVectorStore {
    /// Create an empty store backed by the given embedding capability.
    #[must_use]
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embeddings,
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add_documents(
        &self,
        chunks: &[TextChunk],
        namespace: &str,
    ) -> Result<(), StoreError> {
        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embeddings.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(StoreError::Backend(format!(
                    "embedding count mismatch: {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }

            let mut stored = Vec::with_capacity(batch.len());
            for (chunk, vector) in batch.iter().zip(vectors) {
                stored.push(StoredVector {
                    metadata: chunk_to_metadata(chunk)?,
                    vector,
                });
            }

            let mut namespaces = self.namespaces.write().await;
            namespaces
                .entry(namespace.to_string())
                .or_default()
                .extend(stored);
        }
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        namespace: &str,
        top_k: usize,
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<RetrievalMatch>, StoreError> {
        let query_vector = self.embeddings.embed_query(text).await?;

        let namespaces = self.namespaces.read().await;
        let Some(stored) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &StoredVector)> = stored
            .iter()
            .filter(|entry| matches_filter(&entry.metadata, filter))
            .map(|entry| (cosine_similarity(&query_vector, &entry.vector), entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| metadata_to_match(entry.metadata.clone(), score))
            .collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn matches_filter(metadata: &serde_json::Value, filter: Option<&serde_json::Value>) -> bool {
    let Some(filter) = filter.and_then(|f| f.as_object()) else {
        return true;
    };
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkMetadata;
    use crate::providers::MockEmbeddingProvider;

    fn chunk(text: &str, source: &str) -> TextChunk {
        TextChunk {
            text: text.to_string(),
            metadata: ChunkMetadata::new(source, "", "2026-01-01T00:00:00Z", "Example"),
        }
    }

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::new(Arc::new(MockEmbeddingProvider::new()))
    }

    #[tokio::test]
    async fn add_then_query_returns_exact_match_first() {
        let store = store();
        let chunks = vec![
            chunk("opening hours are 9am-5pm", "https://x.com/hours"),
            chunk("directions to the office", "https://x.com/directions"),
        ];
        store.add_documents(&chunks, "example").await.unwrap();

        let matches = store
            .query("opening hours are 9am-5pm", "example", 2, None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].text, "opening hours are 9am-5pm");
        assert_eq!(matches[0].source(), Some("https://x.com/hours"));
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn unknown_namespace_returns_empty() {
        let store = store();
        let matches = store.query("anything", "missing", 5, None).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn delete_and_list_namespaces() {
        let store = store();
        store
            .add_documents(&[chunk("a", "https://x.com/a")], "one")
            .await
            .unwrap();
        store
            .add_documents(&[chunk("b", "https://x.com/b")], "two")
            .await
            .unwrap();
        assert_eq!(
            store.list_namespaces().await.unwrap(),
            vec!["one".to_string(), "two".to_string()]
        );

        store.delete_namespace("one").await.unwrap();
        assert_eq!(store.list_namespaces().await.unwrap(), vec!["two".to_string()]);
    }

    #[tokio::test]
    async fn metadata_filter_restricts_matches() {
        let store = store();
        let mut first = chunk("same text", "https://x.com/a");
        first.metadata.website_name = "SiteA".to_string();
        let mut second = chunk("same text", "https://x.com/b");
        second.metadata.website_name = "SiteB".to_string();
        store
            .add_documents(&[first, second], "example")
            .await
            .unwrap();

        let filter = serde_json::json!({"website_name": "SiteB"});
        let matches = store
            .query("same text", "example", 5, Some(&filter))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source(), Some("https://x.com/b"));
    }
}
