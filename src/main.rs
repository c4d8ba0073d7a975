//! # heat_news
//!
//! A batch pipeline that tracks heat-related deaths and illness reported in
//! Thai news.
//!
//! ## Features
//!
//! - Collects article URLs from Google Alert emails (`.eml`) and Atom feeds
//! - Scrapes article text incrementally; rows with content are never refetched
//! - Classifies relevance and extracts incident fields with an OpenAI-compatible
//!   or Ollama LLM endpoint
//! - Normalises Thai dates, numerals, provinces and regions
//! - Renders province and cause heat maps as static HTML plus a JSON summary
//!
//! ## Usage
//!
//! ```sh
//! heat_news --config config.yaml run --truncate-input
//! ```
//!
//! ## Architecture
//!
//! Stages hand off through CSV ledgers keyed by URL:
//! 1. **Collect**: alerts → `input_file`
//! 2. **Scrape**: `input_file` → `prepare_file`
//! 3. **Extract**: `prepare_file` → filled, heat and base files
//! 4. **Map**: heat records → `maps_dir`

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod alerts;
mod api;
mod cli;
mod config;
mod extraction;
mod ledger;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;
mod validators;

use api::{ChatClient, with_retries};
use cli::{Cli, Command};
use config::Config;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "heat_news starting up");
    debug!(?args, "Parsed CLI arguments");

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    config.log_summary();

    // Early check: the map directory must be writable before any LLM time is spent
    if matches!(args.command, Command::Map { .. } | Command::Run { .. }) {
        let dir = match &args.command {
            Command::Map {
                output_dir: Some(dir), ..
            } => dir.clone(),
            _ => config.data_paths.maps_dir.clone(),
        };
        if let Err(e) = ensure_writable_dir(&dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Map output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    match &args.command {
        Command::ValidateConfig => {
            info!("Configuration is valid");
        }
        Command::Collect => {
            let stats = alerts::collect(&config).await?;
            info!(?stats, "Collect finished");
        }
        Command::Scrape { input, output } => {
            let input = input.as_deref().unwrap_or(config.data_paths.input_file.as_path());
            let output = output.as_deref().unwrap_or(config.data_paths.prepare_file.as_path());
            let stats = scrapers::scrape(&config, input, output).await?;
            info!(?stats, "Scrape finished");
        }
        Command::Extract => {
            let client = with_retries(ChatClient::new(config.llm())?, config.llm());
            let stats = extraction::run_extraction(&config, &client).await?;
            info!(?stats, "Extract finished");
        }
        Command::Map { input, output_dir } => {
            let written = outputs::generate_maps(&config, input.as_deref(), output_dir.as_deref()).await?;
            for path in written {
                info!(path = %path.display(), "Map written");
            }
        }
        Command::Run { .. } => {
            let opts = args.command.run_options().unwrap_or_default();
            let client = with_retries(ChatClient::new(config.llm())?, config.llm());
            let report = pipeline::run(&config, &client, opts).await?;
            debug!(?report, "Pipeline report");
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
