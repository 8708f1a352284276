//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use crawlsmith::chunker::{ChunkMetadata, TextChunk};
use crawlsmith::config::WebsiteConfig;
use crawlsmith::message::Message;
use crawlsmith::providers::{
    AnswerPayload, CompletionProvider, ModelTurn, ProviderError, ToolSpec,
};

/// A website config pointing at an arbitrary sitemap URL.
pub fn website(name: &str, sitemap: &str) -> WebsiteConfig {
    WebsiteConfig {
        name: name.to_string(),
        xml_sitemap: Url::parse(sitemap).expect("valid sitemap url"),
        description: format!("Content from {name}"),
        freshness_days: 7,
        exclude_patterns: Vec::new(),
        include_only_patterns: Vec::new(),
    }
}

/// A chunk with the given text and source URL.
pub fn chunk(text: &str, source: &str) -> TextChunk {
    TextChunk {
        text: text.to_string(),
        metadata: ChunkMetadata::new(source, "", "2026-01-01T00:00:00Z", "Example"),
    }
}

/// Scripted completion provider: queues of chat turns, structured payloads,
/// and plain-prompt responses, popped in call order. An exhausted queue
/// yields a provider error, which exercises the corresponding fallback.
#[derive(Default)]
pub struct MockCompletionProvider {
    turns: Mutex<VecDeque<ModelTurn>>,
    structured: Mutex<VecDeque<AnswerPayload>>,
    prompts: Mutex<VecDeque<String>>,
    pub seen_tool_specs: Mutex<Vec<usize>>,
}

impl MockCompletionProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn script_turn(&self, turn: ModelTurn) {
        self.turns.lock().await.push_back(turn);
    }

    pub async fn script_structured(&self, payload: AnswerPayload) {
        self.structured.lock().await.push_back(payload);
    }

    pub async fn script_prompt(&self, response: &str) {
        self.prompts.lock().await.push_back(response.to_string());
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn chat(
        &self,
        _messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, ProviderError> {
        self.seen_tool_specs.lock().await.push(tools.len());
        self.turns
            .lock()
            .await
            .pop_front()
            .ok_or(ProviderError::Provider {
                provider: "mock",
                message: "no scripted chat turn".to_string(),
            })
    }

    async fn structured_answer(
        &self,
        _preamble: &str,
        _prompt: &str,
    ) -> Result<AnswerPayload, ProviderError> {
        self.structured
            .lock()
            .await
            .pop_front()
            .ok_or(ProviderError::Provider {
                provider: "mock",
                message: "no scripted structured answer".to_string(),
            })
    }

    async fn prompt(&self, _preamble: &str, _prompt: &str) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .await
            .pop_front()
            .ok_or(ProviderError::Provider {
                provider: "mock",
                message: "no scripted prompt response".to_string(),
            })
    }
}
