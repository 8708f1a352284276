//! Runtime settings resolved from the environment.
//!
//! Everything here is operator-facing process configuration: API keys,
//! model names, index placement, crawl pacing. Website definitions live in
//! the separate configuration file handled by [`crate::config`].

use std::env;

/// Default answer returned when no compliant answer can be produced.
pub const DEFAULT_ANSWER: &str = "I'm sorry, I couldn't find a good answer to your question.";

/// Uniform user-facing message for internal failures at the query boundary.
pub const APOLOGY_ANSWER: &str =
    "I'm sorry, I encountered an error while processing your question. Please try again later.";

/// Process-wide runtime settings, loaded once at startup.
///
/// Values come from the environment (a `.env` file is honored via dotenvy).
/// Only the credentials needed by the selected backends are validated here;
/// missing keys surface when the corresponding client is constructed.
#[derive(Clone, Debug)]
pub struct Settings {
    /// OpenAI API key for the embedding and completion models.
    pub openai_api_key: Option<String>,
    /// Pinecone API key.
    pub pinecone_api_key: Option<String>,
    /// Pinecone serverless cloud provider (e.g. "aws").
    pub pinecone_cloud: String,
    /// Pinecone serverless region (e.g. "us-east-1").
    pub pinecone_region: String,
    /// Name of the Pinecone index holding all website namespaces.
    pub pinecone_index: String,
    /// Approximate crawl requests-per-second ceiling.
    pub crawl_rate_limit: u32,
    /// User agent sent on every crawl request.
    pub user_agent: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Completion model name.
    pub llm_model: String,
    /// Answer used when no compliant answer exists.
    pub default_answer: String,
    /// Optional path to a brand guidelines file.
    pub brand_guidelines_file: Option<String>,
    /// Number of matches requested per retrieval.
    pub num_rag_sources: usize,
}

impl Settings {
    /// Load settings from the environment, applying defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            pinecone_api_key: env::var("PINECONE_API_KEY").ok(),
            pinecone_cloud: env::var("PINECONE_CLOUD").unwrap_or_else(|_| "aws".to_string()),
            pinecone_region: env::var("PINECONE_REGION")
                .unwrap_or_else(|_| "us-east-1".to_string()),
            pinecone_index: env::var("PINECONE_INDEX_NAME")
                .unwrap_or_else(|_| "crawlsmith".to_string()),
            crawl_rate_limit: env::var("CRAWL_RATE_LIMIT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(5),
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "crawlsmith/0.1 (+https://github.com/crawlsmith)".to_string()),
            embedding_model: env::var("DEFAULT_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            llm_model: env::var("DEFAULT_LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            default_answer: env::var("DEFAULT_ANSWER")
                .unwrap_or_else(|_| DEFAULT_ANSWER.to_string()),
            brand_guidelines_file: env::var("BRAND_GUIDELINES_FILE").ok(),
            num_rag_sources: env::var("NUM_RAG_SOURCES")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(5),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            pinecone_api_key: None,
            pinecone_cloud: "aws".to_string(),
            pinecone_region: "us-east-1".to_string(),
            pinecone_index: "crawlsmith".to_string(),
            crawl_rate_limit: 5,
            user_agent: "crawlsmith/0.1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            llm_model: "gpt-4o".to_string(),
            default_answer: DEFAULT_ANSWER.to_string(),
            brand_guidelines_file: None,
            num_rag_sources: 5,
        }
    }
}
