//! rig-core backed implementations of the model capabilities.
//!
//! Both providers speak to OpenAI through rig: embeddings via the embedding
//! model API, chat turns via low-level completion requests with the tool
//! schemas bound, structured answers via rig's extractor, and plain
//! completions via a preamble-only agent.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Prompt, ToolDefinition};
use rig::embeddings::EmbeddingModel;
use rig::prelude::*;
use rig::providers::openai;
use tracing::debug;

use super::{AnswerPayload, CompletionProvider, EmbeddingProvider, ModelTurn, ProviderError, ToolSpec};
use crate::message::Message;

/// OpenAI embedding capability via rig.
#[derive(Clone)]
pub struct RigEmbeddingProvider {
    model: openai::EmbeddingModel,
    model_name: String,
}

impl RigEmbeddingProvider {
    /// Build an embedding provider for the named model.
    pub fn new(api_key: &str, model_name: &str) -> Self {
        let client = openai::Client::new(api_key).expect("failed to create OpenAI client");
        Self {
            model: client.embedding_model(model_name),
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for RigEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model_name, batch = texts.len(), "embedding batch");
        let embeddings = self
            .model
            .embed_texts(texts.to_vec())
            .await
            .map_err(|e| ProviderError::Provider {
                provider: "openai-embeddings",
                message: e.to_string(),
            })?;
        Ok(embeddings
            .into_iter()
            .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect())
            .collect())
    }
}

/// OpenAI chat, structured generation and plain completion via rig.
#[derive(Clone)]
pub struct RigCompletionProvider {
    client: openai::Client,
    model_name: String,
}

impl RigCompletionProvider {
    /// Build a completion provider for the named model.
    pub fn new(api_key: &str, model_name: &str) -> Self {
        Self {
            client: openai::Client::new(api_key).expect("failed to create OpenAI client"),
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for RigCompletionProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, ProviderError> {
        // System messages become the preamble; the last user message is the
        // prompt; earlier user/assistant turns ride along as history. Tool
        // messages never travel back to the model here: tool results are
        // synthesized through `structured_answer` instead.
        let preamble = messages
            .iter()
            .filter(|m| m.has_role(Message::SYSTEM))
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");

        let prompt_index = messages
            .iter()
            .rposition(|m| m.has_role(Message::USER))
            .ok_or(ProviderError::Provider {
                provider: "openai",
                message: "no user message to send".to_string(),
            })?;
        let prompt = &messages[prompt_index];

        let history: Vec<rig::completion::Message> = messages
            .iter()
            .enumerate()
            .filter(|(i, m)| {
                *i != prompt_index
                    && !m.has_role(Message::SYSTEM)
                    && !m.has_role(Message::TOOL)
            })
            .map(|(_, m)| {
                if m.has_role(Message::ASSISTANT) {
                    rig::completion::Message::assistant(m.content.clone())
                } else {
                    rig::completion::Message::user(m.content.clone())
                }
            })
            .collect();

        let tool_definitions: Vec<ToolDefinition> = tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            })
            .collect();

        let model = self.client.completion_model(&self.model_name);
        let request = model
            .completion_request(rig::completion::Message::user(prompt.content.clone()))
            .preamble(preamble)
            .messages(history)
            .tools(tool_definitions)
            .build();

        debug!(model = %self.model_name, tools = tools.len(), "invoking completion model");
        let response = model
            .completion(request)
            .await
            .map_err(|e| ProviderError::Provider {
                provider: "openai",
                message: e.to_string(),
            })?;

        // At most one tool call per turn: the first one wins.
        let mut text_parts: Vec<String> = Vec::new();
        for content in response.choice.into_iter() {
            match content {
                AssistantContent::ToolCall(call) => {
                    return Ok(ModelTurn::ToolCall {
                        name: call.function.name,
                        arguments: call.function.arguments,
                    });
                }
                AssistantContent::Text(text) => text_parts.push(text.text),
                _ => {}
            }
        }

        Ok(ModelTurn::Answer(text_parts.join(" ")))
    }

    async fn structured_answer(
        &self,
        preamble: &str,
        prompt: &str,
    ) -> Result<AnswerPayload, ProviderError> {
        let extractor = self
            .client
            .extractor::<AnswerPayload>(&self.model_name)
            .preamble(preamble)
            .build();

        extractor
            .extract(prompt)
            .await
            .map_err(|e| ProviderError::Provider {
                provider: "openai",
                message: e.to_string(),
            })
    }

    async fn prompt(&self, preamble: &str, prompt: &str) -> Result<String, ProviderError> {
        let agent = self
            .client
            .agent(&self.model_name)
            .preamble(preamble)
            .build();

        agent.prompt(prompt).await.map_err(|e| ProviderError::Provider {
            provider: "openai",
            message: e.to_string(),
        })
    }
}
