//! The full run: collect, scrape, extract, map and optionally clean up.

use crate::alerts;
use crate::api::AskAsync;
use crate::config::Config;
use crate::extraction::run_extraction;
use crate::ledger::{self, Ledger, URL};
use crate::models::{CONTEXT, CollectStats, ExtractionStats, IS_NEWS, ScrapeStats};
use crate::outputs::generate_maps;
use crate::scrapers;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument, warn};

const INPUT_BACKUP_STEM: &str = "input_df";

/// Which stages of [`run`] to perform.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_alert: bool,
    pub skip_scraping: bool,
    pub skip_maps: bool,
    /// Empty the input file once everything else succeeded.
    pub truncate_input: bool,
    /// Overrides `truncate_input`.
    pub keep_input: bool,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub collect: Option<CollectStats>,
    pub scrape: Option<ScrapeStats>,
    pub extraction: ExtractionStats,
    pub maps: Vec<PathBuf>,
    pub input_backup: Option<PathBuf>,
}

/// Back up the input file, then rewrite it with only the alert header.
#[instrument(level = "info", skip_all, fields(path = %config.data_paths.input_file.display()))]
pub fn truncate_input(config: &Config) -> Result<Option<PathBuf>, Box<dyn Error>> {
    let input = &config.data_paths.input_file;
    let backup = ledger::backup(input, &config.advanced.base_database.backup_dir, INPUT_BACKUP_STEM)?;
    if backup.is_none() {
        info!("Input file does not exist; nothing to truncate");
        return Ok(None);
    }
    Ledger::with_columns(&[URL, CONTEXT, IS_NEWS]).save(input)?;
    info!("Input file truncated");
    Ok(backup)
}

/// Run every stage in order.
///
/// A failed alert collection is logged and the run continues with whatever
/// the input file already holds; scraping is skipped when there is no input
/// file. Extraction and map failures abort the run.
#[instrument(level = "info", skip_all)]
pub async fn run<C: AskAsync>(config: &Config, client: &C, opts: RunOptions) -> Result<RunReport, Box<dyn Error>> {
    let t0 = Instant::now();
    let paths = &config.data_paths;
    let mut report = RunReport::default();

    if opts.skip_alert {
        info!("Skipping alert collection");
    } else {
        match alerts::collect(config).await {
            Ok(stats) => report.collect = Some(stats),
            Err(e) => warn!(error = %e, "Alert collection failed; continuing with the existing input"),
        }
    }

    if opts.skip_scraping {
        info!("Skipping scraping");
    } else if !paths.input_file.exists() {
        warn!(path = %paths.input_file.display(), "Input file missing; skipping scraping");
    } else {
        report.scrape = Some(scrapers::scrape(config, &paths.input_file, &paths.prepare_file).await?);
    }

    report.extraction = run_extraction(config, client).await?;

    if opts.skip_maps {
        info!("Skipping map generation");
    } else {
        report.maps = generate_maps(config, None, None).await?;
    }

    if opts.truncate_input && !opts.keep_input {
        report.input_backup = truncate_input(config)?;
    }

    let elapsed = t0.elapsed();
    info!(
        new_records = report.extraction.new_records,
        relevant = report.extraction.classified_relevant,
        maps = report.maps.len(),
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Pipeline complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::testing::FakeModel;
    use std::fs;
    use std::path::Path;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        let paths = &mut config.data_paths;
        paths.input_file = dir.join("input.csv");
        paths.prepare_file = dir.join("prepare.csv");
        paths.base_file = dir.join("base.csv");
        paths.output_filled_file = dir.join("filled.csv");
        paths.output_heat_data_file = dir.join("heat.csv");
        paths.maps_dir = dir.join("maps");
        config.advanced.base_database.backup_dir = dir.join("backups");
        config
    }

    #[test]
    fn test_truncate_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert_eq!(truncate_input(&config).unwrap(), None);

        fs::write(&config.data_paths.input_file, "url,context,is_news,extra\nhttps://a/1,c,,x\n").unwrap();
        let backup = truncate_input(&config).unwrap().unwrap();
        assert!(fs::read_to_string(&backup).unwrap().contains("https://a/1"));
        assert_eq!(
            fs::read_to_string(&config.data_paths.input_file).unwrap().trim(),
            "url,context,is_news"
        );
    }

    #[tokio::test]
    async fn test_run_without_network_stages() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(
            &config.data_paths.prepare_file,
            "url,content\nhttps://a/1,ราคาทองคำวันนี้ปรับตัวขึ้นต่อเนื่องอีกครั้ง\n",
        )
        .unwrap();
        fs::write(&config.data_paths.input_file, "url,context\nhttps://a/1,ทอง\n").unwrap();

        let model = FakeModel::new(|_: &str| Ok("0".to_string()));
        let opts = RunOptions {
            skip_alert: true,
            skip_scraping: true,
            truncate_input: true,
            ..Default::default()
        };
        let report = run(&config, &model, opts).await.unwrap();
        assert!(report.collect.is_none());
        assert!(report.scrape.is_none());
        assert_eq!(report.extraction.new_records, 1);
        assert_eq!(report.extraction.classified_irrelevant, 1);
        assert_eq!(report.maps.len(), 3);
        assert!(report.input_backup.is_some());
    }

    #[tokio::test]
    async fn test_missing_input_skips_scraping_and_keep_input_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let model = FakeModel::new(|_: &str| Ok("0".to_string()));
        let opts = RunOptions {
            skip_alert: true,
            skip_maps: true,
            truncate_input: true,
            keep_input: true,
            ..Default::default()
        };
        let report = run(&config, &model, opts).await.unwrap();
        assert!(report.scrape.is_none());
        assert_eq!(report.extraction.new_records, 0);
        assert!(report.maps.is_empty());
        assert!(report.input_backup.is_none());
        assert_eq!(model.calls(), 0);
    }
}
