//! The agent, tools, and review nodes of the answer workflow.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::node::{Node, NodeContext, NodeError, NodePartial};
use super::state::{AgentState, ToolInvocation};
use crate::brand::{BrandReviewer, ReviewVerdict};
use crate::message::Message;
use crate::providers::{CompletionProvider, ModelTurn};
use crate::tools::{RetrievalToolSet, ToolOutput};

const ANSWER_PREAMBLE: &str = "You are a helpful assistant that generates detailed answers \
based on provided context. Your response should be accurate, concise, and directly address \
the user's question. Include relevant sources as complete URLs exactly as provided, without \
modifying them.";

fn answer_prompt(context: &str, question: &str, sources: &[String]) -> String {
    format!(
        "Given the following context, answer the user's question.\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n\n\
         Sources available:\n{sources}\n\n\
         IMPORTANT: For sources, return the complete URLs exactly as provided. \
         Do not modify, split, or change the URLs in any way.",
        sources = sources.join(", "),
    )
}

/// Decides whether to call a retrieval tool, and synthesizes the answer
/// once a tool result is available.
pub struct AgentNode {
    provider: Arc<dyn CompletionProvider>,
    tools: Arc<RetrievalToolSet>,
}

impl AgentNode {
    #[must_use]
    pub fn new(provider: Arc<dyn CompletionProvider>, tools: Arc<RetrievalToolSet>) -> Self {
        Self { provider, tools }
    }

    /// Invoke the model with the tool set bound and record its decision.
    async fn invoke_with_tools(&self, snapshot: &AgentState, ctx: &NodeContext) -> NodePartial {
        ctx.emit("agent", "deciding which tool to use");
        match self
            .provider
            .chat(&snapshot.messages, &self.tools.specs())
            .await
        {
            Ok(ModelTurn::ToolCall { name, arguments }) => {
                ctx.emit("agent", format!("model requested tool {name}"));
                NodePartial::new().with_pending_tool(ToolInvocation { name, arguments })
            }
            Ok(ModelTurn::Answer(text)) => {
                ctx.emit("agent", "model answered directly without tools");
                NodePartial::new()
                    .with_messages(vec![Message::assistant(&text)])
                    .with_answer(text)
                    .with_sources(Vec::new())
            }
            Err(err) => {
                error!(error = %err, "model invocation failed");
                NodePartial::new().with_error(format!("error invoking model with tools: {err}"))
            }
        }
    }

    /// Turn the latest tool result into a structured answer.
    async fn process_tool_result(&self, snapshot: &AgentState, ctx: &NodeContext) -> NodePartial {
        let Some(last) = snapshot.messages.last() else {
            return NodePartial::new().with_error("no tool result to process".to_string());
        };
        let output: ToolOutput = match serde_json::from_str(&last.content) {
            Ok(output) => output,
            Err(err) => {
                error!(error = %err, "malformed tool result");
                return NodePartial::new()
                    .with_error(format!("error processing tool result: {err}"));
            }
        };

        ctx.emit(
            "agent",
            format!("tool returned {} sources", output.sources.len()),
        );
        let prompt = answer_prompt(&output.context, &snapshot.question, &output.sources);

        let mut partial = NodePartial::new()
            .with_context(output.context.clone())
            .with_retrieved_sources(output.sources.clone());

        match self
            .provider
            .structured_answer(ANSWER_PREAMBLE, &prompt)
            .await
        {
            Ok(payload) => {
                info!(sources = payload.sources.len(), "structured answer generated");
                partial.messages = Some(vec![Message::assistant(&payload.response)]);
                partial.answer = Some(payload.response.clone());
                partial.final_answer = Some(payload.response);
                partial.sources = Some(payload.sources);
            }
            Err(err) => {
                // Fall back to an unstructured completion and keep the
                // sources collected from the tool result.
                error!(error = %err, "structured generation failed, falling back");
                match self.provider.prompt(ANSWER_PREAMBLE, &prompt).await {
                    Ok(text) => {
                        partial.messages = Some(vec![Message::assistant(&text)]);
                        partial.answer = Some(text.clone());
                        partial.final_answer = Some(text);
                        partial.sources = Some(output.sources);
                    }
                    Err(fallback_err) => {
                        error!(error = %fallback_err, "fallback completion failed");
                        partial.error =
                            Some(format!("error generating answer: {fallback_err}"));
                    }
                }
            }
        }

        partial
    }
}

#[async_trait]
impl Node for AgentNode {
    async fn run(&self, snapshot: AgentState, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        if snapshot
            .messages
            .last()
            .is_some_and(|m| m.has_role(Message::TOOL))
        {
            return Ok(self.process_tool_result(&snapshot, &ctx).await);
        }
        if snapshot.answer.is_some() {
            ctx.emit("agent", "answer already produced, passing through");
            return Ok(NodePartial::new());
        }
        Ok(self.invoke_with_tools(&snapshot, &ctx).await)
    }
}

/// Executes the scheduled retrieval tool and appends its result to the
/// history as a tool message.
pub struct ToolsNode {
    tools: Arc<RetrievalToolSet>,
}

impl ToolsNode {
    #[must_use]
    pub fn new(tools: Arc<RetrievalToolSet>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Node for ToolsNode {
    async fn run(&self, snapshot: AgentState, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        let Some(invocation) = snapshot.pending_tool else {
            return Err(NodeError::MissingInput {
                what: "pending_tool",
            });
        };

        ctx.emit("tools", format!("executing {}", invocation.name));
        let mut partial = NodePartial::new();
        partial.clear_pending_tool = true;

        let output = match self
            .tools
            .execute(&invocation.name, &invocation.arguments)
            .await
        {
            Ok(output) => output,
            Err(err) => {
                // The agent still gets a tool message so the turn completes;
                // the error text becomes the (empty-sourced) context.
                error!(tool = %invocation.name, error = %err, "retrieval tool failed");
                partial.error = Some(format!("error executing {}: {err}", invocation.name));
                ToolOutput {
                    context: format!("Error retrieving information: {err}"),
                    sources: Vec::new(),
                }
            }
        };

        partial.messages = Some(vec![Message::tool(&serde_json::to_string(&output)?)]);
        Ok(partial)
    }
}

/// Reviews the draft answer for brand compliance and settles the final
/// answer.
pub struct ReviewNode {
    reviewer: BrandReviewer,
    default_answer: String,
}

impl ReviewNode {
    #[must_use]
    pub fn new(reviewer: BrandReviewer, default_answer: &str) -> Self {
        Self {
            reviewer,
            default_answer: default_answer.to_string(),
        }
    }
}

#[async_trait]
impl Node for ReviewNode {
    async fn run(&self, snapshot: AgentState, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        let Some(draft) = snapshot.answer else {
            ctx.emit("review", "no answer to review, using default");
            return Ok(NodePartial::new()
                .with_final_answer(self.default_answer.clone())
                .with_sources(Vec::new()));
        };

        ctx.emit("review", "reviewing answer for brand compliance");
        match self.reviewer.review(&draft).await {
            Ok(ReviewVerdict::Revised(text)) => Ok(NodePartial::new().with_final_answer(text)),
            Ok(ReviewVerdict::Unanswerable) => Ok(NodePartial::new()
                .with_final_answer(self.default_answer.clone())
                .with_sources(Vec::new())),
            Err(err) => {
                // Fall back to the unreviewed draft.
                error!(error = %err, "brand review failed");
                Ok(NodePartial::new()
                    .with_final_answer(draft)
                    .with_error(format!("error in review node: {err}")))
            }
        }
    }
}
