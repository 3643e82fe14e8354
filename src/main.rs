//! Finance News Agent
//! Scheduled financial news ingestion with LLM summaries
//!
//! Features:
//! - Brave news search restricted to allow-listed publishers
//! - Article extraction and Gemini summarization
//! - Bitcoin price snapshots from CoinGecko
//! - Supabase, Postgres or in-memory storage
//! - Per-service rate limits and a global in-flight cap
//! - Correlation IDs for each run

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use finance_news_agent::config::Config;
use finance_news_agent::extract::{ContentExtractor, HtmlExtractor};
use finance_news_agent::http_client::{HttpClientConfig, SharedHttpClient};
use finance_news_agent::pipeline::{IngestionPipeline, NewsComponents, PipelineConfig, RunReport};
use finance_news_agent::price::CoinGeckoPriceFeed;
use finance_news_agent::sources::{BraveNewsSource, CandidateSource};
use finance_news_agent::storage::{self, MemoryStore, NewsStore, PostgresStore};
use finance_news_agent::summarizer::GeminiSummarizer;

/// Finance News Agent - news discovery, summarization and price snapshots
#[derive(Parser, Debug)]
#[command(name = "finance-news-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ingests summarized financial news and Bitcoin price snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run news ingestion and record the current price
    Run {
        /// Write to an in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Run news ingestion only
    News {
        #[arg(long)]
        dry_run: bool,

        /// Search query (repeatable, replaces SEARCH_QUERIES)
        #[arg(short, long)]
        query: Vec<String>,

        /// Maximum number of articles to store
        #[arg(short = 'n', long)]
        max_articles: Option<usize>,
    },

    /// Record the current Bitcoin price only
    Price {
        #[arg(long)]
        dry_run: bool,
    },

    /// Print allow-listed candidates for a query without storing anything
    Search {
        #[arg(short, long)]
        query: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Print the extracted text of an article
    Extract {
        url: String,
    },

    /// Apply the database schema (postgres storage)
    Migrate,
}

/// Generates a new correlation ID for the run
fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    let correlation_id = generate_correlation_id();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        correlation_id = %correlation_id,
        "Starting Finance News Agent"
    );

    let config = Config::load()?;
    config.validate()?;

    info!(
        storage_type = %config.storage_type,
        supabase_key = %config.masked_supabase_key(),
        allowed_sources = ?config.allowed_sources,
        max_articles = config.max_articles_per_run,
        max_concurrent = config.max_concurrent_requests,
        "Configuration loaded"
    );

    let http = Arc::new(SharedHttpClient::new(HttpClientConfig::from_config(&config))?);

    match cli.command {
        Commands::Run { dry_run } => {
            config.require_news()?;
            let store = open_store(&config, http.clone(), dry_run).await?;
            let pipeline = IngestionPipeline::new(PipelineConfig::from_config(&config), store)
                .with_news(news_components(&config, http.clone())?)
                .with_price_feed(Arc::new(CoinGeckoPriceFeed::from_config(http, &config)));
            run_until_signal(&pipeline, &correlation_id).await;
        }

        Commands::News { dry_run, query, max_articles } => {
            config.require_news()?;
            let mut pipeline_config = PipelineConfig::from_config(&config);
            if !query.is_empty() {
                pipeline_config.queries = query;
            }
            if let Some(max) = max_articles {
                if max == 0 {
                    bail!("--max-articles must be greater than zero");
                }
                pipeline_config.max_articles = max;
            }

            let store = open_store(&config, http.clone(), dry_run).await?;
            let pipeline = IngestionPipeline::new(pipeline_config, store)
                .with_news(news_components(&config, http)?);
            run_until_signal(&pipeline, &correlation_id).await;
        }

        Commands::Price { dry_run } => {
            let store = open_store(&config, http.clone(), dry_run).await?;
            let pipeline = IngestionPipeline::new(PipelineConfig::from_config(&config), store)
                .with_price_feed(Arc::new(CoinGeckoPriceFeed::from_config(http, &config)));
            run_until_signal(&pipeline, &correlation_id).await;
        }

        Commands::Search { query, output } => {
            search_once(&config, http, &query, &output).await?;
        }

        Commands::Extract { url } => {
            let extractor = HtmlExtractor::from_config(http, &config);
            let text = extractor.extract(&url).await?;
            println!("{}", text);
        }

        Commands::Migrate => {
            let Some(url) = config.database_url.as_deref() else {
                bail!("DATABASE_URL is required to apply the schema");
            };
            PostgresStore::connect(url).await?.migrate().await?;
        }
    }

    Ok(())
}

/// Opens the configured store, or an in-memory one for dry runs
async fn open_store(
    config: &Config,
    http: Arc<SharedHttpClient>,
    dry_run: bool,
) -> Result<Arc<dyn NewsStore>> {
    if dry_run {
        info!("Dry run, rows are kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    }

    config.require_storage()?;
    Ok(storage::create_store(config, http).await?)
}

fn news_components(config: &Config, http: Arc<SharedHttpClient>) -> Result<NewsComponents> {
    Ok(NewsComponents {
        source: Arc::new(BraveNewsSource::from_config(http.clone(), config)?),
        extractor: Arc::new(HtmlExtractor::from_config(http.clone(), config)),
        summarizer: Arc::new(GeminiSummarizer::from_config(http, config)?),
    })
}

/// Runs the pipeline once; Ctrl+C abandons the run without a report
async fn run_until_signal(pipeline: &IngestionPipeline, correlation_id: &str) {
    tokio::select! {
        report = pipeline.run(correlation_id) => print_report(&report),
        _ = signal::ctrl_c() => {
            warn!(correlation_id = %correlation_id, "Received Ctrl+C, run interrupted");
        }
    }
}

fn print_report(report: &RunReport) {
    if !report.is_clean() {
        warn!(correlation_id = %report.correlation_id, "Run finished with failures");
    }
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!(error = %e, "Could not serialize run report"),
    }
}

/// Runs a single search from the command line
async fn search_once(config: &Config, http: Arc<SharedHttpClient>, query: &str, output_format: &str) -> Result<()> {
    let source = BraveNewsSource::from_config(http, config)?;
    info!(source = source.id(), query = %query, "Starting search");

    let candidates = source.search(query).await?;

    match output_format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
        _ => {
            println!("\n{:<18} {:<60} {}", "Source", "Title", "URL");
            println!("{}", "-".repeat(110));
            for candidate in &candidates {
                let title: String = candidate.title.chars().take(58).collect();
                println!("{:<18} {:<60} {}", candidate.source, title, candidate.url);
            }
            println!("\nTotal: {} candidates", candidates.len());
        }
    }

    Ok(())
}
