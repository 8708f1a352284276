//! Graph construction and execution for the answer workflow.
//!
//! A workflow is a set of named nodes joined by static and conditional
//! edges from a virtual `Start` to a virtual `End`. Execution is
//! sequential: one node runs per step, its partial update is merged, and
//! the outgoing edge of the node decides the successor.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use super::node::{Node, NodeContext, NodeError};
use super::state::AgentState;

/// Ceiling on steps per run; trips only if a conditional edge loops
/// without making progress.
const MAX_STEPS: u64 = 16;

/// Identifies a node within the workflow graph.
///
/// `Start` and `End` are virtual endpoints: they carry edges but never
/// execute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Start,
    End,
    Custom(String),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

/// Predicate deciding the successor node from the merged state.
pub type EdgePredicate = Arc<dyn Fn(&AgentState) -> NodeKind + Send + Sync>;

/// Errors raised while compiling or running a workflow graph.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// An edge references a node that was never registered.
    #[error("edge references unknown node: {0}")]
    UnknownNode(String),

    /// `Start` has no outgoing edge.
    #[error("graph has no edge out of Start")]
    NoEntry,

    /// A node has no outgoing edge and is not `End`.
    #[error("no edge out of node: {0}")]
    DanglingNode(String),

    /// The run exceeded the step ceiling.
    #[error("workflow exceeded {MAX_STEPS} steps without reaching End")]
    StepLimit,

    /// A node failed fatally.
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Builder for workflow graphs.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, NodeKind>,
    conditional_edges: FxHashMap<NodeKind, EdgePredicate>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. `Start` and `End` are virtual and ignored here.
    #[must_use]
    pub fn add_node(mut self, id: NodeKind, node: impl Node + 'static) -> Self {
        match id {
            NodeKind::Start | NodeKind::End => {
                tracing::warn!(%id, "ignoring registration of virtual node kind");
            }
            _ => {
                self.nodes.insert(id, Arc::new(node));
            }
        }
        self
    }

    /// Add an unconditional edge.
    #[must_use]
    pub fn add_edge(mut self, from: NodeKind, to: NodeKind) -> Self {
        self.edges.insert(from, to);
        self
    }

    /// Add a conditional edge; it takes precedence over any unconditional
    /// edge out of the same node.
    #[must_use]
    pub fn add_conditional_edge(mut self, from: NodeKind, predicate: EdgePredicate) -> Self {
        self.conditional_edges.insert(from, predicate);
        self
    }

    /// Validate the topology and produce an executable [`App`].
    pub fn compile(self) -> Result<App, WorkflowError> {
        if !self.edges.contains_key(&NodeKind::Start)
            && !self.conditional_edges.contains_key(&NodeKind::Start)
        {
            return Err(WorkflowError::NoEntry);
        }
        for (from, to) in &self.edges {
            for kind in [from, to] {
                if let NodeKind::Custom(_) = kind {
                    if !self.nodes.contains_key(kind) {
                        return Err(WorkflowError::UnknownNode(kind.to_string()));
                    }
                }
            }
        }
        for kind in self.nodes.keys() {
            if !self.edges.contains_key(kind) && !self.conditional_edges.contains_key(kind) {
                return Err(WorkflowError::DanglingNode(kind.to_string()));
            }
        }
        Ok(App {
            nodes: self.nodes,
            edges: self.edges,
            conditional_edges: self.conditional_edges,
        })
    }
}

/// A compiled, executable workflow.
pub struct App {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, NodeKind>,
    conditional_edges: FxHashMap<NodeKind, EdgePredicate>,
}

impl App {
    /// Run the workflow to completion, returning the final state.
    pub async fn invoke(&self, mut state: AgentState) -> Result<AgentState, WorkflowError> {
        let mut current = self.successor(&NodeKind::Start, &state)?;
        let mut step: u64 = 0;

        while current != NodeKind::End {
            step += 1;
            if step > MAX_STEPS {
                return Err(WorkflowError::StepLimit);
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| WorkflowError::UnknownNode(current.to_string()))?;
            debug!(node = %current, step, "executing workflow node");

            let ctx = NodeContext {
                node_id: current.to_string(),
                step,
            };
            let partial = node.run(state.clone(), ctx).await?;
            state.apply(partial);

            current = self.successor(&current, &state)?;
        }

        Ok(state)
    }

    fn successor(&self, from: &NodeKind, state: &AgentState) -> Result<NodeKind, WorkflowError> {
        if let Some(predicate) = self.conditional_edges.get(from) {
            let target = predicate(state);
            debug!(from = %from, to = %target, "conditional routing");
            return Ok(target);
        }
        self.edges
            .get(from)
            .cloned()
            .ok_or_else(|| WorkflowError::DanglingNode(from.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::node::NodePartial;
    use async_trait::async_trait;

    struct MarkNode(&'static str);

    #[async_trait]
    impl Node for MarkNode {
        async fn run(
            &self,
            snapshot: AgentState,
            _ctx: NodeContext,
        ) -> Result<NodePartial, NodeError> {
            let mut answer = snapshot.answer.unwrap_or_default();
            answer.push_str(self.0);
            Ok(NodePartial::new().with_answer(answer))
        }
    }

    #[tokio::test]
    async fn linear_graph_runs_in_order() {
        let app = GraphBuilder::new()
            .add_node(NodeKind::from("a"), MarkNode("a"))
            .add_node(NodeKind::from("b"), MarkNode("b"))
            .add_edge(NodeKind::Start, NodeKind::from("a"))
            .add_edge(NodeKind::from("a"), NodeKind::from("b"))
            .add_edge(NodeKind::from("b"), NodeKind::End)
            .compile()
            .unwrap();

        let out = app.invoke(AgentState::new("q", "sys")).await.unwrap();
        assert_eq!(out.answer.as_deref(), Some("ab"));
    }

    #[tokio::test]
    async fn conditional_edge_routes_on_state() {
        let app = GraphBuilder::new()
            .add_node(NodeKind::from("a"), MarkNode("a"))
            .add_node(NodeKind::from("skip"), MarkNode("never"))
            .add_edge(NodeKind::Start, NodeKind::from("a"))
            .add_conditional_edge(
                NodeKind::from("a"),
                Arc::new(|state: &AgentState| {
                    if state.answer.as_deref() == Some("a") {
                        NodeKind::End
                    } else {
                        NodeKind::from("skip")
                    }
                }),
            )
            .add_edge(NodeKind::from("skip"), NodeKind::End)
            .compile()
            .unwrap();

        let out = app.invoke(AgentState::new("q", "sys")).await.unwrap();
        assert_eq!(out.answer.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn unbounded_loop_trips_step_limit() {
        let app = GraphBuilder::new()
            .add_node(NodeKind::from("a"), MarkNode("a"))
            .add_edge(NodeKind::Start, NodeKind::from("a"))
            .add_edge(NodeKind::from("a"), NodeKind::from("a"))
            .compile()
            .unwrap();

        let err = app.invoke(AgentState::new("q", "sys")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::StepLimit));
    }

    #[test]
    fn compile_rejects_edges_to_unknown_nodes() {
        let result = GraphBuilder::new()
            .add_node(NodeKind::from("a"), MarkNode("a"))
            .add_edge(NodeKind::Start, NodeKind::from("missing"))
            .add_edge(NodeKind::from("a"), NodeKind::End)
            .compile();
        assert!(matches!(result, Err(WorkflowError::UnknownNode(_))));
    }

    #[test]
    fn compile_requires_an_entry_edge() {
        let result = GraphBuilder::new()
            .add_node(NodeKind::from("a"), MarkNode("a"))
            .add_edge(NodeKind::from("a"), NodeKind::End)
            .compile();
        assert!(matches!(result, Err(WorkflowError::NoEntry)));
    }
}
