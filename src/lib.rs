//! crawlsmith: sitemap-driven crawling and retrieval-augmented answering.
//!
//! The crate has two coupled halves:
//!
//! ```text
//! Crawl pipeline
//!   config ──► crawler::sitemap ──► crawler::fetcher ──► chunker
//!                                                          │
//!                       stores (Pinecone / in-memory) ◄────┘
//!
//! Answer workflow
//!   question ──► workflow (agent ⇄ tools ──► review) ──► {response, sources}
//!                   │            │
//!                   │            └─► tools::RetrievalToolSet ──► stores
//!                   └─► providers (completion / structured generation)
//! ```
//!
//! The embedding/LLM provider, the vector index, and document conversion
//! are consumed through narrow capability interfaces ([`providers`],
//! [`stores::VectorStore`], [`crawler::convert`]); everything else is this
//! crate's own machinery.

pub mod brand;
pub mod chunker;
pub mod config;
pub mod crawler;
pub mod message;
pub mod providers;
pub mod settings;
pub mod stores;
pub mod tools;
pub mod workflow;

pub use chunker::{ChunkMetadata, TextChunk, TextChunker};
pub use config::{CrawlConfig, WebsiteConfig, derive_namespace};
pub use crawler::{CrawlOutcome, CrawlStatus, crawl_website, process_websites};
pub use message::Message;
pub use settings::Settings;
pub use stores::{MemoryVectorStore, PineconeStore, RetrievalMatch, VectorStore};
pub use workflow::{AgentRouter, QueryResponse};
