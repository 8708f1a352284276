//! crawlsmith CLI: crawl configured websites and ask questions about them.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crawlsmith::config::CrawlConfig;
use crawlsmith::crawler::process_websites;
use crawlsmith::providers::rig::{RigCompletionProvider, RigEmbeddingProvider};
use crawlsmith::providers::{CompletionProvider, EmbeddingProvider};
use crawlsmith::settings::Settings;
use crawlsmith::stores::{PineconeStore, VectorStore};
use crawlsmith::workflow::AgentRouter;

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "crawlsmith", about = "Crawl websites and chat with their content")]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every website in the configuration file.
    Crawl {
        /// Path to the configuration file (JSON or YAML).
        #[arg(long)]
        config: String,
        /// Recrawl websites whose namespace already exists.
        #[arg(long)]
        recrawl: bool,
    },
    /// Ask a question about the crawled websites.
    Ask {
        /// Path to the configuration file (JSON or YAML).
        #[arg(long)]
        config: String,
        /// The question to ask.
        question: String,
    },
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("crawlsmith={fallback}")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn build_providers(
    settings: &Settings,
) -> CliResult<(Arc<dyn EmbeddingProvider>, Arc<dyn CompletionProvider>)> {
    let api_key = settings
        .openai_api_key
        .as_deref()
        .ok_or("OPENAI_API_KEY is not set")?;
    let embeddings: Arc<dyn EmbeddingProvider> =
        Arc::new(RigEmbeddingProvider::new(api_key, &settings.embedding_model));
    let completions: Arc<dyn CompletionProvider> =
        Arc::new(RigCompletionProvider::new(api_key, &settings.llm_model));
    Ok((embeddings, completions))
}

async fn connect_store(
    settings: &Settings,
    embeddings: Arc<dyn EmbeddingProvider>,
) -> CliResult<Arc<dyn VectorStore>> {
    let api_key = settings
        .pinecone_api_key
        .as_deref()
        .ok_or("PINECONE_API_KEY is not set")?;
    let store = PineconeStore::builder(
        api_key,
        &settings.pinecone_index,
        &settings.pinecone_cloud,
        &settings.pinecone_region,
        embeddings,
    )
    .connect()
    .await?;
    Ok(Arc::new(store))
}

async fn run(cli: Cli) -> CliResult<()> {
    let settings = Settings::from_env();

    match cli.command {
        Command::Crawl { config, recrawl } => {
            let config = CrawlConfig::from_file(&config)?;
            let (embeddings, _) = build_providers(&settings)?;
            let store = connect_store(&settings, embeddings).await?;
            let outcomes = process_websites(&config, store.as_ref(), &settings, recrawl).await;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        Command::Ask { config, question } => {
            let config = CrawlConfig::from_file(&config)?;
            let (embeddings, completions) = build_providers(&settings)?;
            let store = connect_store(&settings, embeddings).await?;
            let router = AgentRouter::new(completions, store, &config.websites, &settings)?;
            let result = router.process_query(&question).await;

            println!("{}", "-".repeat(80));
            println!("Query: {question}");
            if result.sources.is_empty() {
                println!("No sources used");
            } else {
                println!("Sources used:");
                for source in &result.sources {
                    println!("- {source}");
                }
            }
            println!("{}", "-".repeat(80));
            println!("{}", result.response);
            println!("{}", "-".repeat(80));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal error");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
