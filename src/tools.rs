//! Retrieval tool set bound into the answer workflow.
//!
//! One retrieval tool exists per configured website, but dispatch is
//! data-driven: a table maps each tool name to its namespace and
//! description, and a single generic retrieval operation executes whichever
//! tool the model selected. Tool schemas are generated from the table at
//! startup and handed to the completion capability.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::WebsiteConfig;
use crate::providers::ToolSpec;
use crate::stores::{StoreError, VectorStore};

/// Errors raised while executing a retrieval tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for a tool that is not in the dispatch table.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The tool call arguments did not match the declared schema.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    /// The underlying store query failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One entry in the dispatch table.
#[derive(Clone, Debug)]
struct RetrievalTool {
    name: String,
    namespace: String,
    description: String,
}

/// Context and sources assembled from one retrieval.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ToolOutput {
    /// Concatenation of the matched chunks, each labeled by its source.
    pub context: String,
    /// Deduplicated source URLs in first-seen order.
    pub sources: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RetrievalArguments {
    query: String,
}

/// The set of retrieval tools for every configured website.
pub struct RetrievalToolSet {
    store: Arc<dyn VectorStore>,
    tools: Vec<RetrievalTool>,
    top_k: usize,
}

impl RetrievalToolSet {
    /// Build the dispatch table from the configured websites.
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, websites: &[WebsiteConfig], top_k: usize) -> Self {
        let tools: Vec<RetrievalTool> = websites
            .iter()
            .map(|website| {
                let namespace = website.namespace();
                RetrievalTool {
                    name: format!("retrieve_from_{namespace}"),
                    namespace,
                    description: website.description.clone(),
                }
            })
            .collect();
        info!(tools = tools.len(), "created retrieval tools");
        Self {
            store,
            tools,
            top_k,
        }
    }

    /// Tool schemas to bind into the completion request.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query"
                        }
                    },
                    "required": ["query"]
                }),
            })
            .collect()
    }

    /// True when no tools are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute the named tool with the model-provided arguments.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let arguments: RetrievalArguments = serde_json::from_value(arguments.clone())?;

        info!(
            tool = %tool.name,
            namespace = %tool.namespace,
            query = %truncate(&arguments.query, 50),
            "executing retrieval tool"
        );

        let matches = self
            .store
            .query(&arguments.query, &tool.namespace, self.top_k, None)
            .await?;

        let mut context = format!("Information from {}:\n\n", tool.namespace);
        let mut sources: Vec<String> = Vec::new();
        let mut sections: Vec<String> = Vec::new();
        for m in &matches {
            let source = m.source().unwrap_or_default().to_string();
            sections.push(format!("Document {source}:\n{}", m.text));
            if !source.is_empty() && !sources.contains(&source) {
                sources.push(source);
            }
        }
        context.push_str(&sections.join("\n\n"));

        if matches.is_empty() {
            warn!(namespace = %tool.namespace, "retrieval returned no matches");
        }
        info!(
            namespace = %tool.namespace,
            sources = sources.len(),
            "retrieved unique sources"
        );

        Ok(ToolOutput { context, sources })
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkMetadata, TextChunk};
    use crate::providers::MockEmbeddingProvider;
    use crate::stores::MemoryVectorStore;
    use url::Url;

    fn website(name: &str) -> WebsiteConfig {
        WebsiteConfig {
            name: name.to_string(),
            xml_sitemap: Url::parse("https://example.com/sitemap.xml").unwrap(),
            description: format!("Content from {name}"),
            freshness_days: 7,
            exclude_patterns: Vec::new(),
            include_only_patterns: Vec::new(),
        }
    }

    async fn toolset_with_data() -> RetrievalToolSet {
        let store = Arc::new(MemoryVectorStore::new(Arc::new(
            MockEmbeddingProvider::new(),
        )));
        let chunks = vec![
            TextChunk {
                text: "We are open 9am-5pm Mon-Fri".to_string(),
                metadata: ChunkMetadata::new("https://x.com/hours", "Hours", "", "Example"),
            },
            TextChunk {
                text: "We are open 9am-5pm Mon-Fri".to_string(),
                metadata: ChunkMetadata::new("https://x.com/hours", "Hours", "", "Example"),
            },
            TextChunk {
                text: "Visit us downtown".to_string(),
                metadata: ChunkMetadata::new("https://x.com/visit", "Visit", "", "Example"),
            },
        ];
        store.add_documents(&chunks, "example").await.unwrap();
        RetrievalToolSet::new(store, &[website("Example")], 5)
    }

    #[tokio::test]
    async fn tool_names_follow_namespaces() {
        let toolset = toolset_with_data().await;
        let specs = toolset.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "retrieve_from_example");
        assert_eq!(specs[0].parameters["required"][0], "query");
    }

    #[tokio::test]
    async fn execute_assembles_context_and_dedupes_sources() {
        let toolset = toolset_with_data().await;
        let output = toolset
            .execute(
                "retrieve_from_example",
                &json!({"query": "when are you open?"}),
            )
            .await
            .unwrap();
        assert!(output.context.starts_with("Information from example:"));
        assert!(output.context.contains("Document https://x.com/hours:"));
        // Two chunks share a source; the list keeps one entry per URL.
        assert_eq!(output.sources.len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let toolset = toolset_with_data().await;
        let err = toolset
            .execute("retrieve_from_nowhere", &json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }
}
