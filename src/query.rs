// 🔍 Query Surfaces - Search, filters and the loaded dataset
//
// Shared by the dashboard and the HTTP API. The dataset is loaded once and
// only refreshed through an explicit reload.

use crate::config::PipelineConfig;
use crate::enrichment::{load_enriched, EnrichedRecord};
use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Filter value meaning "no filter"
pub const ALL: &str = "All";

/// Text search plus exact state/status filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "q", default)]
    pub text: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Case-insensitive substring over name or CIN; exact state and status
    pub fn matches(&self, record: &EnrichedRecord) -> bool {
        if let Some(text) = active(&self.text) {
            let needle = text.to_lowercase();
            let hit = record.company_name.to_lowercase().contains(&needle)
                || record.cin.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        if let Some(state) = active(&self.state) {
            if record.state != state {
                return false;
            }
        }

        if let Some(status) = active(&self.status) {
            if record.status != status {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, records: &'a [EnrichedRecord]) -> Vec<&'a EnrichedRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Empty strings and "All" are treated as absent
fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty() && *v != ALL)
}

/// Distinct values offered by the state and status filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub states: Vec<String>,
    pub statuses: Vec<String>,
}

pub fn filter_options(records: &[EnrichedRecord]) -> FilterOptions {
    let states: BTreeSet<&str> = records.iter().map(|r| r.state.as_str()).collect();
    let statuses: BTreeSet<&str> = records.iter().map(|r| r.status.as_str()).collect();

    FilterOptions {
        states: states.into_iter().map(String::from).collect(),
        statuses: statuses.into_iter().map(String::from).collect(),
    }
}

// ============================================================================
// QUESTIONS
// ============================================================================

pub const UNKNOWN_QUESTION_REPLY: &str =
    "I'm still learning! Try asking about incorporations or status changes.";

/// Rule-based answer to a free-text question about the dataset
pub fn answer(question: &str, records: &[EnrichedRecord]) -> String {
    let q = question.to_lowercase();
    let with_status = |status: &str| records.iter().filter(|r| r.status == status).count();

    if q.contains("new") && q.contains("incorporation") {
        format!("Total new incorporations today: {}", with_status("Active"))
    } else if q.contains("strike") || q.contains("off") {
        format!("Total struck-off companies: {}", with_status("Strike Off"))
    } else {
        UNKNOWN_QUESTION_REPLY.to_string()
    }
}

// ============================================================================
// DATASET HANDLE
// ============================================================================

/// Enriched dataset and summary text as last loaded from disk
#[derive(Debug, Clone)]
pub struct DatasetHandle {
    enriched_path: PathBuf,
    summary_path: PathBuf,
    records: Vec<EnrichedRecord>,
    summary: Option<String>,
    loaded_at: Option<DateTime<Utc>>,
}

impl DatasetHandle {
    /// Unloaded handle; call `reload` to read the files
    pub fn new(enriched_path: impl Into<PathBuf>, summary_path: impl Into<PathBuf>) -> Self {
        DatasetHandle {
            enriched_path: enriched_path.into(),
            summary_path: summary_path.into(),
            records: Vec::new(),
            summary: None,
            loaded_at: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.enriched_output, &config.summary_output)
    }

    /// Load now, logging instead of failing when nothing is there yet
    pub fn open(enriched_path: impl Into<PathBuf>, summary_path: impl Into<PathBuf>) -> Self {
        let mut handle = Self::new(enriched_path, summary_path);
        if let Err(e) = handle.reload() {
            warn!(error = %e, "dataset not loaded");
        }
        handle
    }

    /// Re-read both files. On error the previous contents are kept.
    pub fn reload(&mut self) -> PipelineResult<usize> {
        if !self.enriched_path.exists() {
            return Err(PipelineError::MissingInput(self.enriched_path.clone()));
        }

        let records = load_enriched(&self.enriched_path)?;
        let summary = read_optional(&self.summary_path)?;

        self.records = records;
        self.summary = summary;
        self.loaded_at = Some(Utc::now());

        info!(
            path = %self.enriched_path.display(),
            records = self.records.len(),
            "dataset loaded"
        );

        Ok(self.records.len())
    }

    pub fn is_loaded(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn enriched_path(&self) -> &Path {
        &self.enriched_path
    }

    pub fn search(&self, query: &SearchQuery) -> Vec<&EnrichedRecord> {
        query.apply(&self.records)
    }

    pub fn filter_options(&self) -> FilterOptions {
        filter_options(&self.records)
    }

    pub fn answer(&self, question: &str) -> String {
        answer(question, &self.records)
    }
}

fn read_optional(path: &Path) -> PipelineResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
}
