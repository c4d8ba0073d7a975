//! Command-line interface definitions for heat_news.
//!
//! Every stage is a subcommand; `run` chains them. Global options can also be
//! given through environment variables.

use crate::pipeline::RunOptions;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Thai heat-incident news pipeline.
///
/// # Examples
///
/// ```sh
/// # Whole pipeline, then empty the input file (a backup is kept)
/// heat_news run --truncate-input
///
/// # Only redraw the maps from a specific file
/// heat_news map --input data/heat_data.csv --output-dir public/
///
/// # Another config, verbose logging
/// HEAT_NEWS_CONFIG=prod.yaml heat_news -v extract
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long, global = true, env = "HEAT_NEWS_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Debug logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read alert emails and feeds into the input file
    Collect,

    /// Fetch article content for rows that lack it
    Scrape {
        /// Alert ledger to read (defaults to data_paths.input_file)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Prepare ledger to fill (defaults to data_paths.prepare_file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify and extract fields from the prepare file
    Extract,

    /// Render the heat maps
    Map {
        /// Heat ledger to draw from
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for the HTML and JSON files (defaults to data_paths.maps_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Run every stage in order
    Run {
        #[arg(long)]
        skip_alert: bool,

        #[arg(long)]
        skip_scraping: bool,

        #[arg(long)]
        skip_maps: bool,

        /// Empty the input file afterwards (a backup is written first)
        #[arg(long)]
        truncate_input: bool,

        /// Never truncate the input file, even with --truncate-input
        #[arg(long)]
        keep_input: bool,
    },

    /// Load the configuration, log a summary and exit
    ValidateConfig,
}

impl Command {
    /// Stage options for `run`; `None` for the other subcommands.
    pub fn run_options(&self) -> Option<RunOptions> {
        match *self {
            Command::Run {
                skip_alert,
                skip_scraping,
                skip_maps,
                truncate_input,
                keep_input,
            } => Some(RunOptions {
                skip_alert,
                skip_scraping,
                skip_maps,
                truncate_input,
                keep_input,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["heat_news", "extract"]).unwrap();
        assert_eq!(cli.command, Command::Extract);
        assert!(!cli.verbose);
        // HEAT_NEWS_CONFIG is not set in the test environment
        if std::env::var_os("HEAT_NEWS_CONFIG").is_none() {
            assert_eq!(cli.config, PathBuf::from("config.yaml"));
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["heat_news", "map", "-v", "--config", "x.yaml", "-o", "out"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("x.yaml"));
        assert_eq!(
            cli.command,
            Command::Map {
                input: None,
                output_dir: Some(PathBuf::from("out")),
            }
        );
    }

    #[test]
    fn test_scrape_paths() {
        let cli = Cli::try_parse_from(["heat_news", "scrape", "-i", "a.csv", "--output", "b.csv"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Scrape {
                input: Some(PathBuf::from("a.csv")),
                output: Some(PathBuf::from("b.csv")),
            }
        );
        assert!(cli.command.run_options().is_none());
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "heat_news",
            "run",
            "--skip-alert",
            "--truncate-input",
            "--keep-input",
        ])
        .unwrap();
        let opts = cli.command.run_options().unwrap();
        assert!(opts.skip_alert);
        assert!(!opts.skip_scraping);
        assert!(!opts.skip_maps);
        assert!(opts.truncate_input);
        assert!(opts.keep_input);
    }

    #[test]
    fn test_validate_config_and_unknown_command() {
        let cli = Cli::try_parse_from(["heat_news", "validate-config"]).unwrap();
        assert_eq!(cli.command, Command::ValidateConfig);
        assert!(Cli::try_parse_from(["heat_news", "publish"]).is_err());
        assert!(Cli::try_parse_from(["heat_news"]).is_err());
    }
}
