mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chronicler::config::ChroniclerConfig;

#[derive(Parser)]
#[command(name = "chronicler", version, about = "Memory-driven narrative engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an interactive story session with the offline narrator
    Play,
    /// Show fact ledger statistics
    Stats,
    /// Export the fact ledger and audit log as JSON to stdout
    Export,
    /// Inspect a single fact and its audit history
    Inspect {
        /// Fact id (UUID)
        fact_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ChroniclerConfig::load()?;

    // Log to stderr so stdout stays clean for narrative text and JSON export.
    let filter = EnvFilter::try_new(&config.session.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Play => cli::play::play(&config).await?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Export => cli::export::export(&config)?,
        Command::Inspect { fact_id } => cli::inspect::inspect(&config, &fact_id)?,
    }

    Ok(())
}
