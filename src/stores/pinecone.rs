//! Pinecone serverless backend for the vector store gateway.
//!
//! Talks to the Pinecone REST API directly: the control plane for index
//! existence, creation and readiness, the index host for namespaced
//! upsert/query/delete/stats. The embedding dimension is discovered once at
//! connect time by probing the embedding capability, then used to provision
//! the index when it does not exist yet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    RetrievalMatch, StoreError, UPSERT_BATCH_SIZE, VectorStore, chunk_to_metadata,
    metadata_to_match,
};
use crate::chunker::TextChunk;
use crate::providers::EmbeddingProvider;

const DEFAULT_API_BASE: &str = "https://api.pinecone.io";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);
const READY_POLL_ATTEMPTS: u32 = 60;

/// Builder for [`PineconeStore`].
pub struct PineconeStoreBuilder {
    api_key: String,
    index_name: String,
    cloud: String,
    region: String,
    api_base: String,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl PineconeStoreBuilder {
    /// Override the control-plane base URL (used by tests).
    #[must_use]
    pub fn api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Connect: probe the embedding dimension, ensure the index exists and
    /// is ready, and resolve the index host.
    pub async fn connect(self) -> Result<PineconeStore, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| StoreError::Backend("invalid Pinecone API key".to_string()))?,
        );
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        let dimension = self.embeddings.probe_dimension().await?;
        info!(index = %self.index_name, dimension, "connecting to Pinecone");

        let store = PineconeStore {
            http,
            api_base: self.api_base,
            host: String::new(),
            index_name: self.index_name,
            embeddings: self.embeddings,
        };

        let host = match store.describe_index().await? {
            Some(index) if index.status.ready => index.host,
            Some(_) => store.wait_until_ready().await?,
            None => {
                store.create_index(dimension, &self.cloud, &self.region).await?;
                store.wait_until_ready().await?
            }
        };

        Ok(PineconeStore { host, ..store })
    }
}

/// Pinecone-backed [`VectorStore`].
pub struct PineconeStore {
    http: Client,
    api_base: String,
    host: String,
    index_name: String,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl PineconeStore {
    /// Start building a store for the given index and placement.
    #[must_use]
    pub fn builder(
        api_key: &str,
        index_name: &str,
        cloud: &str,
        region: &str,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> PineconeStoreBuilder {
        PineconeStoreBuilder {
            api_key: api_key.to_string(),
            index_name: index_name.to_string(),
            cloud: cloud.to_string(),
            region: region.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            embeddings,
        }
    }

    fn control_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn data_url(&self, path: &str) -> String {
        // The control plane returns a bare host; tests may hand back a full
        // URL for a local mock server.
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}{path}", self.host.trim_end_matches('/'))
        } else {
            format!("https://{}{path}", self.host)
        }
    }

    async fn describe_index(&self) -> Result<Option<IndexDescription>, StoreError> {
        let response = self
            .http
            .get(self.control_url(&format!("/indexes/{}", self.index_name)))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "describe index failed with status {}",
                response.status()
            )));
        }
        Ok(Some(response.json().await?))
    }

    async fn create_index(
        &self,
        dimension: usize,
        cloud: &str,
        region: &str,
    ) -> Result<(), StoreError> {
        info!(index = %self.index_name, dimension, cloud, region, "creating Pinecone index");
        let body = serde_json::json!({
            "name": self.index_name,
            "dimension": dimension,
            "metric": "cosine",
            "spec": { "serverless": { "cloud": cloud, "region": region } },
        });
        let response = self
            .http
            .post(self.control_url("/indexes"))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "create index failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<String, StoreError> {
        for _ in 0..READY_POLL_ATTEMPTS {
            if let Some(index) = self.describe_index().await? {
                if index.status.ready {
                    return Ok(index.host);
                }
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        Err(StoreError::Backend(format!(
            "index {} did not become ready",
            self.index_name
        )))
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn add_documents(
        &self,
        chunks: &[TextChunk],
        namespace: &str,
    ) -> Result<(), StoreError> {
        if !chunks.is_empty() {
            info!(
                chunks = chunks.len(),
                namespace, "embedding and upserting chunks"
            );
        }
        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = self.embeddings.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(StoreError::Backend(format!(
                    "embedding count mismatch: {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            let mut vectors = Vec::with_capacity(batch.len());
            for (chunk, values) in batch.iter().zip(embeddings) {
                vectors.push(UpsertVector {
                    id: Uuid::new_v4().to_string(),
                    values,
                    metadata: chunk_to_metadata(chunk)?,
                });
            }

            let body = UpsertRequest {
                vectors,
                namespace: namespace.to_string(),
            };
            let response = self
                .http
                .post(self.data_url("/vectors/upsert"))
                .json(&body)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(StoreError::Backend(format!(
                    "upsert failed with status {}",
                    response.status()
                )));
            }
            debug!(batch = body.vectors.len(), namespace, "upserted batch");
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
        let vector = self.embeddings.embed_query(text).await?;
        let body = QueryRequest {
            vector,
            top_k,
            namespace: namespace.to_string(),
            include_metadata: true,
            filter: filter.cloned(),
        };

        let response = self
            .http
            .post(self.data_url("/query"))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "query failed with status {}",
                response.status()
            )));
        }

        let parsed: QueryResponse = response.json().await?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| metadata_to_match(m.metadata.unwrap_or_default(), m.score))
            .collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        info!(namespace, "deleting namespace");
        let body = serde_json::json!({ "deleteAll": true, "namespace": namespace });
        let response = self
            .http
            .post(self.data_url("/vectors/delete"))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "namespace delete failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
        let response = self
            .http
            .post(self.data_url("/describe_index_stats"))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "index stats failed with status {}",
                response.status()
            )));
        }
        let parsed: IndexStats = response.json().await?;
        let mut names: Vec<String> = parsed.namespaces.into_keys().collect();
        names.sort();
        Ok(names)
    }
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: String,
    status: IndexStatus,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Serialize)]
struct UpsertVector {
    id: String,
    values: Vec<f32>,
    metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    vectors: Vec<UpsertVector>,
    namespace: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    namespace: String,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IndexStats {
    #[serde(default)]
    namespaces: std::collections::HashMap<String, serde_json::Value>,
}
