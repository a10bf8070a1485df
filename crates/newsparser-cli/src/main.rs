use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsparser_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "newsparser")]
#[command(author, version, about = "News feed ingestion service with scheduled fetching")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and HTTP API until interrupted
    Serve,
    /// Run one feed fetch in the foreground and print the result
    Fetch,
    /// List stored articles
    List {
        /// Maximum number of articles to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
        /// Only show articles whose topic contains this text
        #[arg(short, long)]
        topic: Option<String>,
        /// Only show articles matching all of these keywords
        #[arg(short, long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Some(Commands::Serve) | None => commands::serve::run(config).await,
        Some(Commands::Fetch) => commands::fetch::run(config).await,
        Some(Commands::List { limit, topic, search }) => {
            commands::list::run(&config, limit, topic.as_deref(), search.as_deref()).await
        }
    }
}
