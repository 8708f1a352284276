//! Node execution primitives for the answer workflow.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::state::{AgentState, ToolInvocation};
use crate::message::Message;

/// A single unit of computation within the answer workflow.
///
/// Nodes receive a snapshot of the current state and return a partial
/// update. Recoverable failures belong in [`NodePartial::error`]; returning
/// `Err` stops the run and surfaces as the uniform fallback at the query
/// boundary.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node against the given state snapshot.
    async fn run(&self, snapshot: AgentState, ctx: NodeContext) -> Result<NodePartial, NodeError>;
}

/// Execution context passed to nodes.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Identifier of the executing node.
    pub node_id: String,
    /// Current step number within this run.
    pub step: u64,
}

impl NodeContext {
    /// Emit a node-scoped progress message.
    pub fn emit(&self, scope: &str, message: impl AsRef<str>) {
        info!(node = %self.node_id, step = self.step, scope, "{}", message.as_ref());
    }
}

/// Partial state update returned by node execution.
///
/// Every field is optional; the runner merges whatever is set. Messages are
/// appended, scalar fields replaced.
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    /// Messages to append to the history.
    pub messages: Option<Vec<Message>>,
    /// Replacement retrieval context.
    pub context: Option<String>,
    /// Draft answer.
    pub answer: Option<String>,
    /// Reviewed answer.
    pub final_answer: Option<String>,
    /// Replacement source list.
    pub sources: Option<Vec<String>>,
    /// Replacement retrieved-source list.
    pub retrieved_sources: Option<Vec<String>>,
    /// Tool call to schedule.
    pub pending_tool: Option<ToolInvocation>,
    /// Clear any scheduled tool call (applied before `pending_tool`).
    pub clear_pending_tool: bool,
    /// Recoverable failure to record.
    pub error: Option<String>,
}

impl NodePartial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    #[must_use]
    pub fn with_final_answer(mut self, final_answer: impl Into<String>) -> Self {
        self.final_answer = Some(final_answer.into());
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = Some(sources);
        self
    }

    #[must_use]
    pub fn with_retrieved_sources(mut self, sources: Vec<String>) -> Self {
        self.retrieved_sources = Some(sources);
        self
    }

    #[must_use]
    pub fn with_pending_tool(mut self, invocation: ToolInvocation) -> Self {
        self.pending_tool = Some(invocation);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Fatal errors that halt workflow execution.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    MissingInput { what: &'static str },

    /// External provider or service error with no degraded path.
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization error.
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
