//! The classify-then-extract stage over the prepare ledger.

use super::{ExtractionError, classify, extract, extract::RawFields};
use crate::api::AskAsync;
use crate::config::{ColumnSpec, Config, DataType};
use crate::ledger::{self, Ledger};
use crate::models::{
    CLASSIFICATION_CONFIDENCE, CLASSIFICATION_METHOD, CONTENT, CONTEXT, Classification,
    EXTRACTED_AT, EXTRACTION_STATUS, ExtractionStats, IS_NEWS, IS_RELEVANT, MONTH_TH,
    PROCESSING_STATUS, REGION, SCRAPE_STATUS, ScrapeStatus, flag, is_flag_set,
};
use crate::validators::{normalize_or_null, province_region, thai_month_name};
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

const BASE_BACKUP_STEM: &str = "base_heat_map";

fn log_progress(stage: &'static str, done: usize, total: usize, every: usize) {
    if done % every == 0 || done == total {
        info!(stage, done, total, "Progress");
    }
}

/// Scraped content, or the alert snippet when nothing was scraped.
fn article_text(ledger: &Ledger, row: usize) -> String {
    ledger
        .value(row, CONTENT)
        .or_else(|| ledger.value(row, CONTEXT))
        .unwrap_or_default()
        .to_string()
}

fn record_classification(ledger: &mut Ledger, row: usize, result: &Classification) {
    let relevant = flag(result.is_relevant);
    ledger.set(row, IS_NEWS, relevant);
    ledger.set(row, IS_RELEVANT, relevant);
    ledger.set(row, CLASSIFICATION_CONFIDENCE, format!("{:.2}", result.confidence));
    ledger.set(row, CLASSIFICATION_METHOD, result.method.as_str());
}

fn record_fields(ledger: &mut Ledger, row: usize, fields: &RawFields, columns: &[&ColumnSpec], config: &Config) {
    for column in columns {
        let raw = fields.get(&column.name).and_then(|v| v.as_deref());
        let value = normalize_or_null(raw, column, &config.advanced).unwrap_or_default();
        ledger.set(row, &column.name, value);
    }
    fill_derived(ledger, row, columns, config);
}

/// `region` from the province column and `month_th` from the first date column.
fn fill_derived(ledger: &mut Ledger, row: usize, columns: &[&ColumnSpec], config: &Config) {
    if ledger.value(row, REGION).is_none() {
        if let Some(region) = ledger
            .value(row, &config.maps.province_column)
            .and_then(province_region)
        {
            ledger.set(row, REGION, region);
        }
    }
    if ledger.value(row, MONTH_TH).is_none() {
        if let Some(month) = columns
            .iter()
            .find(|c| c.data_type == DataType::Date)
            .and_then(|c| ledger.value(row, &c.name))
            .and_then(thai_month_name)
        {
            ledger.set(row, MONTH_TH, month);
        }
    }
}

/// Classify every new row of the prepare ledger and extract fields for the
/// relevant ones.
///
/// Writes the filled file (all processed rows), the heat file (relevant rows)
/// and, when the base database is enabled, appends to the base file after
/// backing it up. Nothing is written when there are no new rows.
#[instrument(level = "info", skip_all, fields(input = %config.data_paths.prepare_file.display()))]
pub async fn run_extraction<C: AskAsync>(config: &Config, client: &C) -> Result<ExtractionStats, Box<dyn Error>> {
    let t0 = Instant::now();
    let paths = &config.data_paths;
    let processing = &config.processing;
    let base_settings = &config.advanced.base_database;

    let input = Ledger::load(&paths.prepare_file)?;
    let mut base = if base_settings.enabled {
        Ledger::load(&paths.base_file)?
    } else {
        Ledger::default()
    };

    let mut stats = ExtractionStats {
        total_input: input.len(),
        ..Default::default()
    };
    let known: HashSet<String> = if base_settings.enabled && processing.skips_processed() {
        base.urls()
    } else {
        HashSet::new()
    };
    let mut unscraped = 0;
    let mut ledger = input.filtered(|l, row| {
        if known.contains(l.url(row)) {
            stats.already_processed += 1;
            return false;
        }
        if processing.require_scraped
            && l.get(row, SCRAPE_STATUS).and_then(ScrapeStatus::parse) != Some(ScrapeStatus::Ok)
        {
            unscraped += 1;
            return false;
        }
        true
    });
    stats.new_records = ledger.len();
    info!(
        total_input = stats.total_input,
        already_processed = stats.already_processed,
        unscraped,
        new_records = stats.new_records,
        "Selected rows to process"
    );

    if ledger.is_empty() {
        info!("No new records; nothing to write");
        stats.processing_time_ms = t0.elapsed().as_millis();
        return Ok(stats);
    }

    // Classification
    let total = ledger.len();
    let every = processing.batch_size;
    let max_chars = processing.max_content_chars;
    let template = &config.prompts.classification;
    let jobs: Vec<(usize, String)> = (0..total).map(|row| (row, article_text(&ledger, row))).collect();
    let classified: Vec<(usize, Classification)> = stream::iter(jobs)
        .map(|(row, text)| async move { (row, classify(client, template, &text, max_chars).await) })
        .buffer_unordered(processing.llm_concurrency)
        .enumerate()
        .inspect(|(done, _)| log_progress("classification", done + 1, total, every))
        .map(|(_, result)| result)
        .collect()
        .await;

    let mut relevant = Vec::new();
    for (row, result) in &classified {
        record_classification(&mut ledger, *row, result);
        if result.is_relevant {
            stats.classified_relevant += 1;
            relevant.push((*row, article_text(&ledger, *row)));
        } else {
            stats.classified_irrelevant += 1;
        }
    }
    relevant.sort_by_key(|(row, _)| *row);
    info!(
        relevant = stats.classified_relevant,
        irrelevant = stats.classified_irrelevant,
        "Classification complete"
    );

    // Extraction
    let columns = config.enabled_columns();
    for column in &columns {
        ledger.ensure_column(&column.name);
    }
    ledger.ensure_column(EXTRACTION_STATUS);
    let template = &config.prompts.extraction;
    let columns_ref = columns.as_slice();
    let to_extract = relevant.len();
    let extracted: Vec<(usize, Result<RawFields, ExtractionError>)> = stream::iter(relevant)
        .map(|(row, text)| async move {
            (row, extract(client, template, columns_ref, &text, max_chars).await)
        })
        .buffer_unordered(processing.llm_concurrency)
        .enumerate()
        .inspect(|(done, _)| log_progress("extraction", done + 1, to_extract, every))
        .map(|(_, result)| result)
        .collect()
        .await;

    for (row, result) in extracted {
        match result {
            Ok(fields) => {
                record_fields(&mut ledger, row, &fields, &columns, config);
                ledger.set(row, EXTRACTION_STATUS, "success");
                stats.extraction_success += 1;
            }
            Err(e) => {
                warn!(url = %ledger.url(row), error = %e, "Extraction failed");
                ledger.set(row, EXTRACTION_STATUS, "failed");
                stats.extraction_failed += 1;
            }
        }
    }

    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    for row in 0..ledger.len() {
        let status = if is_flag_set(ledger.get(row, IS_RELEVANT)) {
            "extracted"
        } else {
            "irrelevant"
        };
        ledger.set(row, PROCESSING_STATUS, status);
        ledger.set(row, EXTRACTED_AT, stamp.as_str());
    }

    ledger.save(&paths.output_filled_file)?;
    let heat = ledger.filtered(|l, row| is_flag_set(l.get(row, IS_RELEVANT)));
    heat.save(&paths.output_heat_data_file)?;
    debug!(
        filled = %paths.output_filled_file.display(),
        heat = %paths.output_heat_data_file.display(),
        heat_rows = heat.len(),
        "Wrote stage outputs"
    );

    if base_settings.enabled {
        ledger::backup(&paths.base_file, &base_settings.backup_dir, BASE_BACKUP_STEM)?;
        let appended = base.append_rows(&ledger);
        base.save(&paths.base_file)?;
        info!(appended, base_rows = base.len(), "Base database updated");
    }

    stats.processing_time_ms = t0.elapsed().as_millis();
    info!(
        new_records = stats.new_records,
        relevant = stats.classified_relevant,
        extraction_success = stats.extraction_success,
        extraction_failed = stats.extraction_failed,
        elapsed_ms = stats.processing_time_ms as u64,
        "Extraction complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::testing::{FakeModel, QueueModel};
    use crate::validators::provinces::NORTHEAST;
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

    fn heat_model() -> FakeModel<impl Fn(&str) -> Result<String, crate::api::LlmError>> {
        FakeModel::new(|user: &str| {
            if user.contains("สกัดข้อมูล") {
                Ok(r#"{"death_count": "2 ราย", "injured_count": null,
                       "location_province": "จ.ขอนแก่น", "incident_date": "15 มีนาคม 2567",
                       "death_cause": "โรคลมแดด"}"#
                    .to_string())
            } else if user.contains("ลมแดด") {
                Ok("1".to_string())
            } else {
                Ok("0".to_string())
            }
        })
    }

    #[tokio::test]
    async fn test_full_stage() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(
            &config.data_paths.prepare_file,
            "url,context,content,scrape_status\n\
             https://a.example/heat,ข่าว,ชายวัย 60 ปีเสียชีวิตจากโรคลมแดดที่ขอนแก่น 2 ราย,ok\n\
             https://a.example/gold,ทอง,ราคาทองคำวันนี้ปรับตัวขึ้นต่อเนื่องอีกครั้ง,ok\n\
             https://a.example/empty,สั้น,,error: fetch\n",
        )
        .unwrap();

        let model = heat_model();
        let stats = run_extraction(&config, &model).await.unwrap();
        assert_eq!(stats.total_input, 3);
        assert_eq!(stats.new_records, 3);
        assert_eq!(stats.classified_relevant, 1);
        assert_eq!(stats.classified_irrelevant, 2);
        assert_eq!(stats.extraction_success, 1);
        assert_eq!(stats.extraction_failed, 0);
        // two classifications plus one extraction; the empty row is never sent
        assert_eq!(model.calls(), 3);

        let filled = Ledger::load(&config.data_paths.output_filled_file).unwrap();
        assert_eq!(filled.len(), 3);
        assert_eq!(filled.get(2, CLASSIFICATION_METHOD), Some("skipped_empty"));
        assert_eq!(filled.get(1, PROCESSING_STATUS), Some("irrelevant"));
        assert_eq!(filled.get(1, CLASSIFICATION_CONFIDENCE), Some("1.00"));
        assert!(filled.value(0, EXTRACTED_AT).is_some());

        let heat = Ledger::load(&config.data_paths.output_heat_data_file).unwrap();
        assert_eq!(heat.len(), 1);
        assert_eq!(heat.url(0), "https://a.example/heat");
        assert_eq!(heat.get(0, IS_NEWS), Some("1"));
        assert_eq!(heat.get(0, "death_count"), Some("2"));
        assert_eq!(heat.get(0, "injured_count"), Some(""));
        assert_eq!(heat.get(0, "location_province"), Some("ขอนแก่น"));
        assert_eq!(heat.get(0, "incident_date"), Some("2024-03-15"));
        assert_eq!(heat.get(0, REGION), Some(NORTHEAST));
        assert_eq!(heat.get(0, MONTH_TH), Some("มีนาคม"));
        assert_eq!(heat.get(0, EXTRACTION_STATUS), Some("success"));
        assert_eq!(heat.get(0, PROCESSING_STATUS), Some("extracted"));

        let base = Ledger::load(&config.data_paths.base_file).unwrap();
        assert_eq!(base.len(), 3);
        // the base did not exist before, so there was nothing to back up
        assert!(!config.advanced.base_database.backup_dir.exists());
    }

    #[tokio::test]
    async fn test_rows_in_base_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(
            &config.data_paths.prepare_file,
            "url,content\nhttps://a.example/old,ข่าวเก่าที่ประมวลผลไปแล้วก่อนหน้านี้\n",
        )
        .unwrap();
        fs::write(&config.data_paths.base_file, "url,is_relevant\nhttps://a.example/old,1\n").unwrap();

        let model = heat_model();
        let stats = run_extraction(&config, &model).await.unwrap();
        assert_eq!(stats.already_processed, 1);
        assert_eq!(stats.new_records, 0);
        assert_eq!(model.calls(), 0);
        assert!(!config.data_paths.output_filled_file.exists());
        assert!(!config.data_paths.output_heat_data_file.exists());
    }

    #[tokio::test]
    async fn test_existing_base_is_backed_up_and_extended() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(
            &config.data_paths.prepare_file,
            "url,content\n\
             https://a.example/old,ข่าวเก่าที่ประมวลผลไปแล้วก่อนหน้านี้\n\
             https://a.example/new,เด็กหญิงเป็นลมแดดระหว่างเข้าแถวตอนเช้า\n",
        )
        .unwrap();
        fs::write(&config.data_paths.base_file, "url,is_relevant\nhttps://a.example/old,1\n").unwrap();

        let stats = run_extraction(&config, &heat_model()).await.unwrap();
        assert_eq!(stats.already_processed, 1);
        assert_eq!(stats.new_records, 1);

        let base = Ledger::load(&config.data_paths.base_file).unwrap();
        assert_eq!(base.len(), 2);
        assert_eq!(base.url(1), "https://a.example/new");
        assert_eq!(base.get(1, "location_province"), Some("ขอนแก่น"));
        let backups = fs::read_dir(&config.advanced.base_database.backup_dir).unwrap().count();
        assert_eq!(backups, 1);
    }

    #[tokio::test]
    async fn test_failed_extraction_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.advanced.base_database.enabled = false;
        fs::write(
            &config.data_paths.prepare_file,
            "url,content\nhttps://a.example/heat,ชายวัย 60 ปีเสียชีวิตจากโรคลมแดด\n",
        )
        .unwrap();

        let model = QueueModel::new(vec![Ok("1".to_string()), Ok("ไม่พบข้อมูล".to_string())]);
        let stats = run_extraction(&config, &model).await.unwrap();
        assert_eq!(stats.classified_relevant, 1);
        assert_eq!(stats.extraction_failed, 1);

        let heat = Ledger::load(&config.data_paths.output_heat_data_file).unwrap();
        assert_eq!(heat.get(0, EXTRACTION_STATUS), Some("failed"));
        assert_eq!(heat.get(0, PROCESSING_STATUS), Some("extracted"));
        assert_eq!(heat.get(0, "death_count"), Some(""));
        assert!(!config.data_paths.base_file.exists());
    }

    #[tokio::test]
    async fn test_require_scraped_drops_unscraped_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.processing.require_scraped = true;
        fs::write(
            &config.data_paths.prepare_file,
            "url,context,content,scrape_status\n\
             https://a.example/ok,ข่าว,ราคาทองคำวันนี้ปรับตัวขึ้นต่อเนื่องอีกครั้ง,ok\n\
             https://a.example/failed,ข่าวโรคลมแดด,,error: fetch\n",
        )
        .unwrap();

        let stats = run_extraction(&config, &heat_model()).await.unwrap();
        assert_eq!(stats.total_input, 2);
        assert_eq!(stats.new_records, 1);
        let filled = Ledger::load(&config.data_paths.output_filled_file).unwrap();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled.url(0), "https://a.example/ok");
    }

    #[test]
    fn test_article_text_falls_back_to_context() {
        let mut ledger = Ledger::with_columns(&["url", "context", "content"]);
        let mut record = ledger::Record::new();
        record.insert("url".to_string(), "https://a/1".to_string());
        record.insert("context".to_string(), "ย่อข่าว".to_string());
        record.insert("content".to_string(), "nan".to_string());
        ledger.push_record(&record);
        assert_eq!(article_text(&ledger, 0), "ย่อข่าว");
        ledger.set(0, CONTENT, "เนื้อข่าว");
        assert_eq!(article_text(&ledger, 0), "เนื้อข่าว");
    }
}
