//! Query routing: wires the workflow graph and exposes the
//! question-in/answer-out boundary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::agents::{AgentNode, ReviewNode, ToolsNode};
use super::graph::{App, GraphBuilder, NodeKind, WorkflowError};
use super::state::AgentState;
use crate::brand::BrandReviewer;
use crate::config::WebsiteConfig;
use crate::providers::CompletionProvider;
use crate::settings::{APOLOGY_ANSWER, Settings};
use crate::stores::VectorStore;
use crate::tools::RetrievalToolSet;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates detailed answers \
based on provided context. Your response should be accurate, concise, and directly address \
the user's question. You must use one of the provided tools, when available, to answer the \
question. It is critical that all answers are based on the information provided by the tools.";

/// The response contract of the query-answering boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub sources: Vec<String>,
}

/// Routes questions through retrieval tools and answer generation.
///
/// Constructed once with its dependencies and passed to every caller;
/// independent queries may run concurrently, each with private state.
pub struct AgentRouter {
    app: App,
    default_answer: String,
}

impl AgentRouter {
    /// Build the workflow graph over the configured websites.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
        websites: &[WebsiteConfig],
        settings: &Settings,
    ) -> Result<Self, WorkflowError> {
        info!(websites = websites.len(), "initializing agent router");
        let tools = Arc::new(RetrievalToolSet::new(
            store,
            websites,
            settings.num_rag_sources,
        ));
        let reviewer = BrandReviewer::new(provider.clone(), settings);

        let app = GraphBuilder::new()
            .add_node(NodeKind::from("agent"), AgentNode::new(provider, tools.clone()))
            .add_node(NodeKind::from("tools"), ToolsNode::new(tools))
            .add_node(
                NodeKind::from("review"),
                ReviewNode::new(reviewer, &settings.default_answer),
            )
            .add_edge(NodeKind::Start, NodeKind::from("agent"))
            .add_conditional_edge(
                NodeKind::from("agent"),
                Arc::new(|state: &AgentState| {
                    if state.pending_tool.is_some() {
                        NodeKind::from("tools")
                    } else {
                        NodeKind::from("review")
                    }
                }),
            )
            .add_edge(NodeKind::from("tools"), NodeKind::from("agent"))
            .add_edge(NodeKind::from("review"), NodeKind::End)
            .compile()?;

        Ok(Self {
            app,
            default_answer: settings.default_answer.clone(),
        })
    }

    /// Process one query through the workflow.
    ///
    /// Always produces a response: internal failures surface as a uniform
    /// apologetic message with no sources.
    pub async fn process_query(&self, query: &str) -> QueryResponse {
        info!(%query, "processing query");
        let state = AgentState::new(query, SYSTEM_PROMPT);

        match self.app.invoke(state).await {
            Ok(final_state) => {
                if let Some(err) = &final_state.error {
                    error!(error = %err, "workflow completed with recorded error");
                }
                let response = final_state
                    .final_answer
                    .clone()
                    .unwrap_or_else(|| self.default_answer.clone());

                // Reported sources must be a subset of what retrieval
                // actually returned; keep the retrieved first-seen order.
                let sources: Vec<String> = final_state
                    .retrieved_sources
                    .iter()
                    .filter(|source| final_state.sources.contains(source))
                    .cloned()
                    .collect();

                QueryResponse { response, sources }
            }
            Err(err) => {
                error!(error = %err, "workflow failed");
                QueryResponse {
                    response: APOLOGY_ANSWER.to_string(),
                    sources: Vec::new(),
                }
            }
        }
    }
}
