//! Map generation from heat records.
//!
//! # Submodules
//!
//! - [`heatmap`]: aggregation by province and cause, and the HTML renderers
//! - [`json`]: the machine-readable summary
//!
//! # Output Structure
//!
//! ```text
//! maps_dir/
//! ├── heat_map_province.html   # Leaflet map + ranking table
//! ├── heat_map_cause.html      # province × cause heat table
//! └── heat_summary.json
//! ```

pub mod heatmap;
pub mod json;

use crate::config::Config;
use crate::ledger::Ledger;
use crate::models::{IS_RELEVANT, is_flag_set};
use heatmap::HeatSummary;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{info, instrument};

pub const PROVINCE_MAP_FILE: &str = "heat_map_province.html";
pub const CAUSE_MAP_FILE: &str = "heat_map_cause.html";

/// Write both HTML maps and the JSON summary into `dir`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_maps(summary: &HeatSummary, dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    fs::create_dir_all(dir).await?;

    let province = dir.join(PROVINCE_MAP_FILE);
    fs::write(&province, heatmap::render_province_map(summary)).await?;
    let cause = dir.join(CAUSE_MAP_FILE);
    fs::write(&cause, heatmap::render_cause_matrix(summary)).await?;
    let json = json::write_summary(summary, dir).await?;

    info!(files = 3, "Wrote heat maps");
    Ok(vec![province, cause, json])
}

/// Rows the maps are drawn from.
///
/// An explicit `input` wins. Otherwise the relevant rows of the base file are
/// used when the base database is enabled and present, else the heat file of
/// the latest run.
pub fn load_map_rows(config: &Config, input: Option<&Path>) -> Result<Ledger, Box<dyn Error>> {
    let paths = &config.data_paths;
    if let Some(input) = input {
        return Ok(Ledger::load(input)?);
    }
    if config.advanced.base_database.enabled && paths.base_file.exists() {
        let base = Ledger::load(&paths.base_file)?;
        return Ok(base.filtered(|l, row| is_flag_set(l.get(row, IS_RELEVANT))));
    }
    Ok(Ledger::load(&paths.output_heat_data_file)?)
}

/// The `map` stage.
#[instrument(level = "info", skip_all)]
pub async fn generate_maps(
    config: &Config,
    input: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let t0 = Instant::now();
    let rows = load_map_rows(config, input)?;
    let cause_vocabulary = config
        .columns
        .schema
        .iter()
        .find(|c| c.name == config.maps.cause_column)
        .map_or(&[][..], |c| c.vocabulary.as_slice());
    let summary = heatmap::aggregate(&rows, &config.maps, cause_vocabulary);
    info!(
        incidents = summary.total_incidents,
        provinces = summary.provinces.len(),
        causes = summary.causes.len(),
        "Aggregated heat records"
    );
    let dir = output_dir.unwrap_or(config.data_paths.maps_dir.as_path());
    let written = write_maps(&summary, dir).await?;
    info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Map generation complete");
    Ok(written)
}
