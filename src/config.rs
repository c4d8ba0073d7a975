//! Pipeline configuration loaded from a YAML file.
//!
//! Every section carries defaults, so an empty file (or a file that only
//! overrides a couple of keys) is a valid configuration. Secrets never live
//! in the file: the LLM API key is read from the environment variable named
//! by `llm_settings.<provider>.api_key_env`.
//!
//! After parsing, column-group bulk operations are applied and the result is
//! validated before any stage sees it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Wire format of the LLM endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFlavor {
    /// OpenAI-compatible `/chat/completions` (Typhoon, vLLM, llama.cpp server, ...).
    OpenAi,
    /// Ollama's native `/api/chat`.
    Ollama,
}

/// Settings for one LLM provider entry under `llm_settings`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api: ApiFlavor,
    pub model: String,
    /// Full chat-completions URL for `openai`, server root for `ollama`.
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_seconds: f64,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: Option<String>,
}

/// An entry without `api:` is an OpenAI-compatible (Typhoon) endpoint.
impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api: ApiFlavor::OpenAi,
            model: "typhoon-v2.1-12b-instruct".to_string(),
            base_url: "https://api.opentyphoon.ai/v1/chat/completions".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            timeout_seconds: 45,
            max_retries: 3,
            retry_delay_seconds: 2.0,
            api_key_env: Some("TYPHOON_API_KEY".to_string()),
        }
    }
}

impl LlmSettings {
    /// Local Ollama server, no key.
    pub fn ollama() -> Self {
        Self {
            api: ApiFlavor::Ollama,
            model: "qwen2.5:3b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key_env: None,
            ..Self::default()
        }
    }
}

/// File locations for every stage hand-off.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataPaths {
    pub input_file: PathBuf,
    pub prepare_file: PathBuf,
    pub base_file: PathBuf,
    pub output_filled_file: PathBuf,
    pub output_heat_data_file: PathBuf,
    pub maps_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("data/input_df.csv"),
            prepare_file: PathBuf::from("data/prepare_data.csv"),
            base_file: PathBuf::from("data/base_heat_map.csv"),
            output_filled_file: PathBuf::from("data/prepare_data_filled.csv"),
            output_heat_data_file: PathBuf::from("data/heat_data.csv"),
            maps_dir: PathBuf::from("maps"),
        }
    }
}

/// Where alert notifications are read from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Directories containing exported `.eml` messages.
    pub eml_dirs: Vec<PathBuf>,
    /// Google Alert Atom feeds: local paths or `http(s)` URLs.
    pub feeds: Vec<String>,
    pub sender: String,
    pub lookback_days: i64,
    pub exclude_domains: Vec<String>,
    pub max_context_chars: usize,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            eml_dirs: Vec::new(),
            feeds: Vec::new(),
            sender: "googlealerts-noreply@google.com".to_string(),
            lookback_days: 60,
            exclude_domains: vec![
                "accounts.google.com".to_string(),
                "support.google.com".to_string(),
                "www.google.com/alerts".to_string(),
            ],
            max_context_chars: 500,
        }
    }
}

/// Incremental scraper behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub concurrency: usize,
    pub timeout_seconds: u64,
    /// Content at or below this many characters is treated as missing.
    pub min_content_chars: usize,
    /// URL substrings that are never fetched (video and social platforms).
    pub skip_platforms: Vec<String>,
    /// Regexes for domains that are left untouched entirely.
    pub blocked_domains: Vec<String>,
    pub user_agent: String,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_seconds: 30,
            min_content_chars: 10,
            skip_platforms: vec![
                "youtube".to_string(),
                "facebook".to_string(),
                "docs.google".to_string(),
            ],
            blocked_domains: vec![r"ebs-ddce\.ddc\.moph\.go\.th".to_string()],
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// Skip URLs already present in the base ledger.
    Incremental,
    /// Reprocess every input row.
    Full,
}

/// Classifier/extractor behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub mode: ProcessingMode,
    pub skip_processed_records: bool,
    /// Drop rows whose `scrape_status` is not `ok` before classification.
    pub require_scraped: bool,
    /// Progress is logged every `batch_size` rows.
    pub batch_size: usize,
    pub llm_concurrency: usize,
    pub max_content_chars: usize,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Incremental,
            skip_processed_records: true,
            require_scraped: false,
            batch_size: 10,
            llm_concurrency: 4,
            max_content_chars: 6000,
        }
    }
}

impl ProcessingSettings {
    /// Whether rows already in the base ledger are skipped.
    pub fn skips_processed(&self) -> bool {
        self.mode == ProcessingMode::Incremental && self.skip_processed_records
    }
}

/// Data type of an extracted column, which selects its validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    Date,
    Time,
    Boolean,
    Multiclass,
    Text,
}

/// Built-in controlled vocabularies for multiclass columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinVocabulary {
    Province,
    Region,
    Gender,
}

/// One extractable column.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default = "default_data_type")]
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Line shown to the model in the extraction prompt.
    #[serde(default)]
    pub extraction_hint: Option<String>,
    #[serde(default)]
    pub builtin_vocabulary: Option<BuiltinVocabulary>,
    /// Allowed values for a multiclass column without a builtin vocabulary.
    #[serde(default)]
    pub vocabulary: Vec<String>,
}

fn default_data_type() -> DataType {
    DataType::Text
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    fn new(name: &str, data_type: DataType, enabled: bool, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            enabled,
            extraction_hint: Some(hint.to_string()),
            builtin_vocabulary: None,
            vocabulary: Vec::new(),
        }
    }

    fn with_vocabulary(mut self, vocabulary: BuiltinVocabulary) -> Self {
        self.builtin_vocabulary = Some(vocabulary);
        self
    }

    /// The builtin vocabulary, inferred from the column name when not set.
    pub fn vocabulary_kind(&self) -> Option<BuiltinVocabulary> {
        if self.builtin_vocabulary.is_some() {
            return self.builtin_vocabulary;
        }
        let name = self.name.to_lowercase();
        if name.contains("province") || name.contains("จังหวัด") {
            Some(BuiltinVocabulary::Province)
        } else if name.contains("region") || name.contains("ภาค") {
            Some(BuiltinVocabulary::Region)
        } else if name.contains("gender") || name.contains("sex") || name.contains("เพศ") {
            Some(BuiltinVocabulary::Gender)
        } else {
            None
        }
    }
}

/// Extractable column schema plus group toggles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub schema: Vec<ColumnSpec>,
    pub column_groups: BTreeMap<String, Vec<String>>,
    /// `enable_all_<group>: bool` entries.
    pub bulk_operations: BTreeMap<String, bool>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        let schema = vec![
            ColumnSpec::new(
                "death_count",
                DataType::Integer,
                true,
                "death_count: จำนวนผู้เสียชีวิต (number of people who died, integer)",
            ),
            ColumnSpec::new(
                "injured_count",
                DataType::Integer,
                true,
                "injured_count: จำนวนผู้บาดเจ็บหรือป่วย (number injured or hospitalised, integer)",
            ),
            ColumnSpec::new(
                "location_province",
                DataType::Multiclass,
                true,
                "location_province: จังหวัดที่เกิดเหตุ (Thai province where it happened)",
            )
            .with_vocabulary(BuiltinVocabulary::Province),
            ColumnSpec::new(
                "incident_date",
                DataType::Date,
                true,
                "incident_date: วันที่เกิดเหตุ (date of the incident, DD/MM/YYYY)",
            ),
            ColumnSpec::new(
                "death_cause",
                DataType::Text,
                true,
                "death_cause: สาเหตุการเสียชีวิต (short cause of death, e.g. โรคลมแดด)",
            ),
            ColumnSpec::new(
                "location_district",
                DataType::Text,
                false,
                "location_district: อำเภอที่เกิดเหตุ (district)",
            ),
            ColumnSpec::new(
                "incident_time",
                DataType::Time,
                false,
                "incident_time: เวลาที่เกิดเหตุ (time, HH:MM)",
            ),
            ColumnSpec::new(
                "victim_age",
                DataType::Integer,
                false,
                "victim_age: อายุผู้เสียชีวิต (age in years)",
            ),
            ColumnSpec::new(
                "victim_gender",
                DataType::Multiclass,
                false,
                "victim_gender: เพศ (ชาย/หญิง)",
            )
            .with_vocabulary(BuiltinVocabulary::Gender),
            ColumnSpec::new(
                "body_temperature",
                DataType::Float,
                false,
                "body_temperature: อุณหภูมิร่างกาย (body temperature in °C)",
            ),
            ColumnSpec::new(
                "ambient_temperature",
                DataType::Float,
                false,
                "ambient_temperature: อุณหภูมิสิ่งแวดล้อม (air temperature in °C)",
            ),
            ColumnSpec::new(
                "hypertension",
                DataType::Boolean,
                false,
                "hypertension: มีโรคความดันโลหิตสูงหรือไม่ (1/0)",
            ),
            ColumnSpec::new(
                "diabetes",
                DataType::Boolean,
                false,
                "diabetes: มีโรคเบาหวานหรือไม่ (1/0)",
            ),
        ];

        let column_groups = BTreeMap::from([
            (
                "location".to_string(),
                vec!["location_province".to_string(), "location_district".to_string()],
            ),
            (
                "medical".to_string(),
                vec!["hypertension".to_string(), "diabetes".to_string()],
            ),
            (
                "temperature".to_string(),
                vec!["body_temperature".to_string(), "ambient_temperature".to_string()],
            ),
            (
                "datetime".to_string(),
                vec!["incident_date".to_string(), "incident_time".to_string()],
            ),
            (
                "basic_info".to_string(),
                vec!["victim_age".to_string(), "victim_gender".to_string()],
            ),
        ]);

        Self {
            schema,
            column_groups,
            bulk_operations: BTreeMap::new(),
        }
    }
}

/// A system message plus a user template with `{placeholders}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptTemplate {
    pub system_message: String,
    pub user_template: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Prompts {
    pub classification: PromptTemplate,
    pub extraction: PromptTemplate,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            classification: PromptTemplate {
                system_message: "คุณเป็นผู้ช่วยคัดกรองข่าวภาษาไทย หน้าที่ของคุณคือบอกว่าข่าวนี้รายงานเหตุการณ์ผู้เสียชีวิตหรือเจ็บป่วยจากความร้อน (เช่น โรคลมแดด ฮีทสโตรก) ในประเทศไทยหรือไม่ ตอบ 1 ถ้าใช่ ตอบ 0 ถ้าไม่ใช่ ตอบเป็นตัวเลขเพียงตัวเดียว".to_string(),
                user_template: "ข่าว:\n{content}\n\nคำตอบ (0 หรือ 1):".to_string(),
            },
            extraction: PromptTemplate {
                system_message: "คุณเป็นผู้ช่วยสกัดข้อมูลจากข่าวภาษาไทย ตอบเป็น JSON เท่านั้น ถ้าไม่พบข้อมูลให้ใส่ null".to_string(),
                user_template: "สกัดข้อมูลต่อไปนี้จากข่าว:\n{fields_description}\n\nข่าว:\n{content}\n\nตอบเป็น JSON ตามรูปแบบนี้:\n{example_json}".to_string(),
            },
        }
    }
}

/// Column names the map generator aggregates on.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MapSettings {
    pub province_column: String,
    pub cause_column: String,
    pub deaths_column: String,
    pub injured_column: String,
    pub title: String,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            province_column: "location_province".to_string(),
            cause_column: "death_cause".to_string(),
            deaths_column: "death_count".to_string(),
            injured_column: "injured_count".to_string(),
            title: "Heat-related incidents in Thailand".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BaseDatabase {
    pub enabled: bool,
    pub backup_dir: PathBuf,
}

impl Default for BaseDatabase {
    fn default() -> Self {
        Self {
            enabled: true,
            backup_dir: PathBuf::from("backups"),
        }
    }
}

/// Numeric bounds for one column.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnRule {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Clamp out-of-range values instead of rejecting them.
    pub clamp: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DateRules {
    pub min_year: i32,
    pub max_year: i32,
    pub allow_future_dates: bool,
}

impl Default for DateRules {
    fn default() -> Self {
        Self {
            min_year: 2020,
            max_year: 2030,
            allow_future_dates: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdvancedSettings {
    pub base_database: BaseDatabase,
    pub column_validation_rules: BTreeMap<String, ColumnRule>,
    pub date_rules: DateRules,
    pub max_text_chars: usize,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            base_database: BaseDatabase::default(),
            column_validation_rules: BTreeMap::from([
                (
                    "death_count".to_string(),
                    ColumnRule {
                        min: Some(0.0),
                        max: Some(1000.0),
                        clamp: false,
                    },
                ),
                (
                    "injured_count".to_string(),
                    ColumnRule {
                        min: Some(0.0),
                        max: Some(10000.0),
                        clamp: false,
                    },
                ),
                (
                    "body_temperature".to_string(),
                    ColumnRule {
                        min: Some(30.0),
                        max: Some(45.0),
                        clamp: false,
                    },
                ),
                (
                    "ambient_temperature".to_string(),
                    ColumnRule {
                        min: Some(-10.0),
                        max: Some(60.0),
                        clamp: false,
                    },
                ),
            ]),
            date_rules: DateRules::default(),
            max_text_chars: 2000,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Key into `llm_settings`.
    pub llm_provider: String,
    pub llm_settings: BTreeMap<String, LlmSettings>,
    pub data_paths: DataPaths,
    pub alerts: AlertSettings,
    pub scraping: ScrapeSettings,
    pub processing: ProcessingSettings,
    pub columns: ColumnsConfig,
    pub prompts: Prompts,
    pub maps: MapSettings,
    pub advanced: AdvancedSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: "ollama".to_string(),
            llm_settings: BTreeMap::from([
                ("ollama".to_string(), LlmSettings::ollama()),
                ("typhoon".to_string(), LlmSettings::default()),
            ]),
            data_paths: DataPaths::default(),
            alerts: AlertSettings::default(),
            scraping: ScrapeSettings::default(),
            processing: ProcessingSettings::default(),
            columns: ColumnsConfig::default(),
            prompts: Prompts::default(),
            maps: MapSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}

impl Config {
    /// Load, apply bulk operations and validate a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&raw)?;
        info!("Loaded configuration");
        Ok(config)
    }

    /// Parse a YAML document; an empty document yields the defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Config = if raw.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.apply_bulk_operations();
        config.validate()?;
        Ok(config)
    }

    /// Toggle every column of a group named by an `enable_all_<group>` key.
    fn apply_bulk_operations(&mut self) {
        for (key, enabled) in &self.columns.bulk_operations {
            let Some(group) = key.strip_prefix("enable_all_") else {
                warn!(%key, "Ignoring bulk operation without enable_all_ prefix");
                continue;
            };
            let Some(members) = self.columns.column_groups.get(group) else {
                warn!(%key, %group, "Bulk operation names an unknown column group");
                continue;
            };
            for column in self
                .columns
                .schema
                .iter_mut()
                .filter(|c| members.contains(&c.name))
            {
                debug!(column = %column.name, enabled, "Bulk operation applied");
                column.enabled = *enabled;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.llm_settings.contains_key(&self.llm_provider) {
            return Err(ConfigError::Invalid(format!(
                "LLM provider '{}' not found in llm_settings",
                self.llm_provider
            )));
        }

        let paths = &self.data_paths;
        for (key, path) in [
            ("input_file", &paths.input_file),
            ("prepare_file", &paths.prepare_file),
            ("base_file", &paths.base_file),
            ("output_filled_file", &paths.output_filled_file),
            ("output_heat_data_file", &paths.output_heat_data_file),
            ("maps_dir", &paths.maps_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("data_paths.{key} is empty")));
            }
        }

        if !self.prompts.classification.user_template.contains("{content}") {
            return Err(ConfigError::Invalid(
                "prompts.classification.user_template must contain {content}".to_string(),
            ));
        }
        let extraction = &self.prompts.extraction.user_template;
        for placeholder in ["{content}", "{fields_description}"] {
            if !extraction.contains(placeholder) {
                return Err(ConfigError::Invalid(format!(
                    "prompts.extraction.user_template must contain {placeholder}"
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns.schema {
            if column.name.trim().is_empty() {
                return Err(ConfigError::Invalid("column with empty name".to_string()));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate column '{}' in columns.schema",
                    column.name
                )));
            }
        }

        if self.scraping.concurrency == 0
            || self.processing.llm_concurrency == 0
            || self.processing.batch_size == 0
        {
            return Err(ConfigError::Invalid(
                "concurrency and batch_size settings must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings of the selected provider.
    pub fn llm(&self) -> &LlmSettings {
        // validate() guarantees the key exists; fall back to the first entry otherwise.
        self.llm_settings
            .get(&self.llm_provider)
            .or_else(|| self.llm_settings.values().next())
            .unwrap_or(&DEFAULT_LLM)
    }

    /// Columns that will be extracted.
    pub fn enabled_columns(&self) -> Vec<&ColumnSpec> {
        self.columns.schema.iter().filter(|c| c.enabled).collect()
    }

    /// Log what this run is going to do.
    pub fn log_summary(&self) {
        let llm = self.llm();
        let paths = &self.data_paths;
        info!(
            provider = %self.llm_provider,
            model = %llm.model,
            temperature = llm.temperature,
            max_tokens = llm.max_tokens,
            "LLM settings"
        );
        info!(
            input = %paths.input_file.display(),
            prepare = %paths.prepare_file.display(),
            base = %paths.base_file.display(),
            filled = %paths.output_filled_file.display(),
            heat = %paths.output_heat_data_file.display(),
            maps = %paths.maps_dir.display(),
            "Data paths"
        );
        info!(
            mode = ?self.processing.mode,
            skip_processed = self.processing.skips_processed(),
            llm_concurrency = self.processing.llm_concurrency,
            enabled_columns = self.enabled_columns().len(),
            total_columns = self.columns.schema.len(),
            "Processing settings"
        );
    }
}

static DEFAULT_LLM: once_cell::sync::Lazy<LlmSettings> = once_cell::sync::Lazy::new(LlmSettings::ollama);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.llm_provider, "ollama");
        assert_eq!(config.enabled_columns().len(), 5);
        assert!(config.processing.skips_processed());
    }

    #[test]
    fn test_partial_provider_entry_is_openai() {
        let yaml = "llm_provider: typhoon\nllm_settings:\n  typhoon:\n    model: typhoon-v2.1-12b-instruct\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        let llm = config.llm();
        assert_eq!(llm.api, ApiFlavor::OpenAi);
        assert_eq!(llm.base_url, "https://api.opentyphoon.ai/v1/chat/completions");
        assert_eq!(llm.api_key_env.as_deref(), Some("TYPHOON_API_KEY"));

        let defaults = Config::default();
        assert_eq!(defaults.llm_settings["ollama"].api, ApiFlavor::Ollama);
        assert!(defaults.llm_settings["ollama"].api_key_env.is_none());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let yaml = r#"
llm_provider: typhoon
scraping:
  concurrency: 8
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.llm().api, ApiFlavor::OpenAi);
        assert_eq!(config.llm().api_key_env.as_deref(), Some("TYPHOON_API_KEY"));
        assert_eq!(config.scraping.concurrency, 8);
        assert_eq!(config.scraping.min_content_chars, 10);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = Config::from_yaml_str("llm_provider: gemini").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bulk_operation_enables_group() {
        let yaml = r#"
columns:
  bulk_operations:
    enable_all_medical: true
    enable_all_location: false
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        let enabled: Vec<&str> = config
            .enabled_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert!(enabled.contains(&"hypertension"));
        assert!(enabled.contains(&"diabetes"));
        assert!(!enabled.contains(&"location_province"));
    }

    #[test]
    fn test_template_without_content_rejected() {
        let yaml = r#"
prompts:
  classification:
    system_message: "x"
    user_template: "no placeholder"
"#;
        assert!(Config::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let yaml = r#"
columns:
  schema:
    - name: a
    - name: a
"#;
        assert!(Config::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_vocabulary_inferred_from_name() {
        let yaml = r#"
columns:
  schema:
    - name: จังหวัดที่เกิดเหตุ
      data_type: multiclass
    - name: gender
      data_type: multiclass
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.columns.schema[0].vocabulary_kind(),
            Some(BuiltinVocabulary::Province)
        );
        assert_eq!(
            config.columns.schema[1].vocabulary_kind(),
            Some(BuiltinVocabulary::Gender)
        );
    }

    #[test]
    fn test_sample_config_parses() {
        let config = Config::from_yaml_str(include_str!("../config.yaml")).unwrap();
        assert_eq!(config.llm().model, "qwen2.5:3b");
        assert_eq!(config.llm_settings["typhoon"].max_retries, 5);
        assert_eq!(config.enabled_columns().len(), 5);
        assert!(config.advanced.column_validation_rules["victim_age"].clamp);
        assert_eq!(config.alerts.eml_dirs, vec![PathBuf::from("alerts/inbox")]);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
