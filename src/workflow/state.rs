//! Workflow state threaded through the answer graph.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// A tool call the model requested but the workflow has not executed yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The mutable record threaded through one query's workflow run.
///
/// Created once per query, mutated by each node's partial update, and
/// discarded after the workflow terminates.
#[derive(Clone, Debug, Default)]
pub struct AgentState {
    /// The user's question.
    pub question: String,
    /// Conversation history, including tool-result messages.
    pub messages: Vec<Message>,
    /// Context assembled from the most recent retrieval.
    pub context: Option<String>,
    /// Draft answer awaiting review.
    pub answer: Option<String>,
    /// The reviewed, user-facing answer.
    pub final_answer: Option<String>,
    /// Source URLs reported for the answer.
    pub sources: Vec<String>,
    /// Source URLs actually returned by retrieval, kept for the subset
    /// check at the query boundary.
    pub retrieved_sources: Vec<String>,
    /// A tool call awaiting execution.
    pub pending_tool: Option<ToolInvocation>,
    /// First failure encountered in any node; does not stop the run.
    pub error: Option<String>,
}

impl AgentState {
    /// Seed the state for one query: system prompt plus the user question.
    #[must_use]
    pub fn new(question: &str, system_prompt: &str) -> Self {
        Self {
            question: question.to_string(),
            messages: vec![Message::system(system_prompt), Message::user(question)],
            ..Default::default()
        }
    }

    /// Merge a node's partial update into the state.
    pub fn apply(&mut self, partial: super::node::NodePartial) {
        if let Some(messages) = partial.messages {
            self.messages.extend(messages);
        }
        if let Some(context) = partial.context {
            self.context = Some(context);
        }
        if let Some(answer) = partial.answer {
            self.answer = Some(answer);
        }
        if let Some(final_answer) = partial.final_answer {
            self.final_answer = Some(final_answer);
        }
        if let Some(sources) = partial.sources {
            self.sources = sources;
        }
        if let Some(retrieved) = partial.retrieved_sources {
            self.retrieved_sources = retrieved;
        }
        if partial.clear_pending_tool {
            self.pending_tool = None;
        }
        if let Some(invocation) = partial.pending_tool {
            self.pending_tool = Some(invocation);
        }
        if let Some(error) = partial.error {
            // The first failure wins; later ones are only logged by their nodes.
            self.error.get_or_insert(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::node::NodePartial;

    #[test]
    fn new_state_seeds_system_and_user_messages() {
        let state = AgentState::new("What are your hours?", "Be helpful.");
        assert_eq!(state.messages.len(), 2);
        assert!(state.messages[0].has_role(Message::SYSTEM));
        assert!(state.messages[1].has_role(Message::USER));
        assert_eq!(state.question, "What are your hours?");
    }

    #[test]
    fn apply_merges_fields_and_keeps_first_error() {
        let mut state = AgentState::new("q", "sys");
        state.apply(
            NodePartial::new()
                .with_messages(vec![Message::assistant("draft")])
                .with_answer("draft")
                .with_error("first failure"),
        );
        state.apply(NodePartial::new().with_error("second failure"));

        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.answer.as_deref(), Some("draft"));
        assert_eq!(state.error.as_deref(), Some("first failure"));
    }

    #[test]
    fn pending_tool_set_and_clear() {
        let mut state = AgentState::new("q", "sys");
        state.apply(NodePartial::new().with_pending_tool(ToolInvocation {
            name: "retrieve_from_example".to_string(),
            arguments: serde_json::json!({"query": "q"}),
        }));
        assert!(state.pending_tool.is_some());

        let mut clear = NodePartial::new();
        clear.clear_pending_tool = true;
        state.apply(clear);
        assert!(state.pending_tool.is_none());
    }
}
