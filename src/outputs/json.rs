//! JSON output of the heat summary.

use super::heatmap::HeatSummary;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

pub const SUMMARY_FILE: &str = "heat_summary.json";

/// Write `summary` as pretty JSON to `{dir}/heat_summary.json`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_summary(summary: &HeatSummary, dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(summary)?;

    if let Err(e) = fs::create_dir_all(dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let path = dir.join(SUMMARY_FILE);
    fs::write(&path, json).await?;
    info!(path = %path.display(), provinces = summary.provinces.len(), "Wrote heat summary JSON");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn test_write_summary() {
        let dir = tempfile::tempdir().unwrap();
        let summary = HeatSummary {
            title: "t".to_string(),
            total_incidents: 2,
            ..Default::default()
        };
        let path = write_summary(&summary, &dir.path().join("maps")).await.unwrap();
        assert!(path.ends_with(SUMMARY_FILE));
        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["total_incidents"], 2);
        assert!(parsed["provinces"].as_array().unwrap().is_empty());
    }
}
