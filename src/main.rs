use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use vitalsync::cli::args::{Cli, Commands};
use vitalsync::cli::commands;
use vitalsync::config::{Config, Paths};
use vitalsync::storage::SqliteStore;
use vitalsync::sync::QueueEngine;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let paths = Paths::resolve(cli.home)?;
    let config = Config::load_from_path(&paths.config_file)
        .with_context(|| format!("Failed to load {}", paths.config_file.display()))?;

    init_tracing(&config.log.filter);

    paths.ensure_dirs()?;
    let store = SqliteStore::open_at(&paths.database)
        .with_context(|| format!("Failed to open {}", paths.database.display()))?;
    let engine = QueueEngine::new(Arc::new(store), config.queue.to_settings());
    let format = cli.output.unwrap_or(config.general.default_output);

    let output = match cli.command {
        Commands::Status => commands::status(&engine, format).await?,
        Commands::List(args) => commands::list(&engine, &args, format).await?,
        Commands::History { limit } => commands::history(&engine, limit, format).await?,
        Commands::Add(args) => commands::add(&engine, args, format).await?,
        Commands::Retry { id } => commands::retry(&engine, &id, format).await?,
        Commands::Remove { id } => commands::remove(&engine, &id, format).await?,
        Commands::Resolve { id, policy } => {
            commands::resolve(&engine, &id, policy, format).await?
        },
        Commands::Clear(args) => commands::clear(&engine, &args, format).await?,
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` or else the configured directive.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("vitalsync=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
