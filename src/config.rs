// ⚙️ Pipeline Configuration - Settings as Data
// Every field has a default, so a partial JSON file (or none at all) is valid.

use crate::differ::ValueComparison;
use crate::error::{PipelineError, PipelineResult};
use crate::record::columns;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// LOOKUP SETTINGS
// ============================================================================

/// Which lookup capability the enrichment engine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// Local derivation from the record itself (no network)
    Heuristic,

    /// HTTP lookup against `LookupConfig::base_url`
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub mode: LookupMode,

    /// Remote endpoint; the CIN is appended as the last path segment
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Pause after each remote lookup in milliseconds
    pub request_pause_ms: u64,

    /// Source label written for successful remote lookups
    pub source_label: String,

    /// Base of the synthesized reference URL; the CIN is appended
    pub placeholder_url_base: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            mode: LookupMode::Heuristic,
            base_url: "https://api.example.com/company".to_string(),
            timeout_secs: 10,
            request_pause_ms: 500,
            source_label: "ExampleAPI".to_string(),
            placeholder_url_base: "https://www.zaubacorp.com/company-search/".to_string(),
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_pause(&self) -> Duration {
        Duration::from_millis(self.request_pause_ms)
    }
}

// ============================================================================
// PIPELINE SETTINGS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one CSV per state
    pub state_data_dir: PathBuf,

    /// Merger output
    pub master_output: PathBuf,

    /// Snapshot pair compared by the differ
    pub old_snapshot: PathBuf,
    pub new_snapshot: PathBuf,

    pub change_log: PathBuf,
    pub enriched_output: PathBuf,
    pub summary_output: PathBuf,

    /// SQLite run ledger
    pub history_db: PathBuf,

    /// Leading change-log entries enriched per run
    pub sample_size: usize,

    /// Fields the differ compares for records present in both snapshots
    pub watched_fields: Vec<String>,

    pub comparison: ValueComparison,

    pub lookup: LookupConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            state_data_dir: PathBuf::from("state_data"),
            master_output: PathBuf::from("output/master_dataset.csv"),
            old_snapshot: PathBuf::from("data_snapshot/day1_master_dataset.csv"),
            new_snapshot: PathBuf::from("data_snapshot/day2_master_dataset.csv"),
            change_log: PathBuf::from("output/daily_change_log.csv"),
            enriched_output: PathBuf::from("output/enriched_dataset.csv"),
            summary_output: PathBuf::from("output/daily_summary.txt"),
            history_db: PathBuf::from("output/pipeline_history.db"),
            sample_size: 50,
            watched_fields: columns::WATCHED
                .iter()
                .map(|f| f.to_string())
                .collect(),
            comparison: ValueComparison::Text,
            lookup: LookupConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.sample_size == 0 {
            return Err(PipelineError::Config(
                "sample_size must be at least 1".to_string(),
            ));
        }
        if self.watched_fields.is_empty() {
            return Err(PipelineError::Config(
                "watched_fields must not be empty".to_string(),
            ));
        }
        if self.lookup.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "lookup.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.lookup.mode == LookupMode::Remote && self.lookup.base_url.trim().is_empty() {
            return Err(PipelineError::Config(
                "lookup.base_url is required for remote lookups".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_pipeline_layout() {
        let config = PipelineConfig::default();

        assert_eq!(config.sample_size, 50);
        assert_eq!(config.lookup.mode, LookupMode::Heuristic);
        assert_eq!(config.lookup.request_pause(), Duration::from_millis(500));
        assert_eq!(config.lookup.timeout(), Duration::from_secs(10));
        assert_eq!(
            config.watched_fields,
            vec!["STATUS", "AUTHORIZED_CAPITAL", "PAID_UP_CAPITAL"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sample_size": 10, "comparison": "numeric", "lookup": {{"mode": "remote"}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();

        assert_eq!(config.sample_size, 10);
        assert_eq!(config.comparison, ValueComparison::Numeric);
        assert_eq!(config.lookup.mode, LookupMode::Remote);
        assert_eq!(config.lookup.timeout_secs, 10);
        assert_eq!(config.change_log, PathBuf::from("output/daily_change_log.csv"));
    }

    #[test]
    fn test_zero_sample_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sample_size": 0}}"#).unwrap();

        let err = PipelineConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"lookup": {{"mode": "remote", "timeout_secs": 0}}}}"#).unwrap();

        let err = PipelineConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_missing_file_reported() {
        let err = PipelineConfig::from_file("/nonexistent/pipeline.json").unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }
}
