//! # Competitor News
//!
//! Normalization, backfill and read API for the competitor and market news
//! shown on a construction and engineering-services market-intelligence
//! dashboard.
//!
//! ## Features
//!
//! - Normalizes scraped records (AECOM, Arup, Atkins, Jacobs, SMEC, WSP press
//!   pages; Construction Dive, Smart Cities Dive, Global Construction Review)
//!   into one schema with fixed defaults
//! - Backfills missing descriptions and impact ratings through an Azure
//!   OpenAI deployment
//! - Derives competitor names from source URLs
//! - Persists to and reads from an Azure Cosmos DB container
//! - Serves `GET /api/news` for the dashboard
//!
//! ## Usage
//!
//! ```sh
//! competitor_news serve
//! competitor_news backfill
//! competitor_news ingest ./scraped/smec_projects.json --normalize
//! competitor_news missing --limit 20
//! ```
//!
//! ## Architecture
//!
//! 1. **Normalize**: fill defaults, canonicalize dates, classify impact
//! 2. **Backfill**: ask the model for description/impact when no level is known
//! 3. **Derive**: competitor name from the URL's domain
//! 4. **Persist**: one upsert per record, keyed by `id`

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod backfill;
mod cli;
mod commands;
mod competitor;
mod error;
mod models;
mod normalize;
mod pipeline;
mod server;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use api::AzureOpenAiClient;
use cli::{Cli, Command};
use pipeline::Pipeline;
use server::AppState;
use store::{CosmosStore, NewsStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(command = ?args.command, "Parsed CLI arguments");
    info!("competitor_news starting up");

    let timeout = Duration::from_secs(args.request_timeout_secs);
    let store: Arc<dyn NewsStore> = Arc::new(CosmosStore::new(args.store.config(timeout))?);
    let pipeline = || -> Result<Pipeline, Box<dyn Error>> {
        let generator = AzureOpenAiClient::new(args.generator.config(timeout)?)?;
        Ok(Pipeline::new(store.clone(), Arc::new(generator)))
    };

    match args.command {
        Command::Serve { bind } => {
            server::serve(bind, AppState { store: store.clone() }).await?;
        }
        Command::Backfill => {
            let pipeline = pipeline()?;
            commands::backfill(store.as_ref(), &pipeline).await?;
        }
        Command::Ingest { ref file, normalize } => {
            let pipeline = if normalize { Some(pipeline()?) } else { None };
            let summary = commands::ingest(file, store.as_ref(), pipeline.as_ref()).await?;
            if summary.failed > 0 {
                error!(failed = summary.failed, "Some records were not stored");
            }
        }
        Command::Missing { limit } => {
            commands::missing_fields(store.as_ref(), limit).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
