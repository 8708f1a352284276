//! The answer workflow: a small state machine that routes a question
//! through tool selection, retrieval, structured answer synthesis, and
//! brand review.
//!
//! The graph runtime here is deliberately compact: nodes receive a snapshot
//! of the [`AgentState`](state::AgentState) and return partial updates the
//! runner merges, with conditional edges deciding the next node from the
//! merged state.

pub mod agents;
pub mod graph;
pub mod node;
pub mod router;
pub mod state;

pub use agents::{AgentNode, ReviewNode, ToolsNode};
pub use graph::{App, EdgePredicate, GraphBuilder, NodeKind, WorkflowError};
pub use node::{Node, NodeContext, NodeError, NodePartial};
pub use router::{AgentRouter, QueryResponse};
pub use state::{AgentState, ToolInvocation};
