use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scholar_core::config::Config;

mod cmd;

#[derive(Parser, Debug)]
#[command(name = "scholar", version, about = "Hybrid lexical + vector search over scholarly papers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, embed and index every paper record (*.json) under a directory.
    Ingest(cmd::ingest::IngestArgs),
    /// Run one query and print the JSON response.
    Search(cmd::search::SearchArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.settings()?;
    match cli.command {
        Command::Ingest(args) => cmd::ingest::run(args, &config, &settings).await,
        Command::Search(args) => cmd::search::run(args, &config, &settings).await,
    }
}
