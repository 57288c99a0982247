// ✨ Enrichment Engine - Change log → enriched dataset
//
// Per entry: parse NEW_VALUE → base info → lookup → merge into the fixed
// 11-column output. Lookup failures are absorbed by the lookup itself, so a
// single bad entry never aborts the batch.

use crate::artifact::{write_atomically, StageOutcome};
use crate::changelog::{ChangeLog, ChangeLogEntry};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::lookup::{build_lookup, placeholder_url, CompanyLookup};
use crate::payload::{parse_new_value, value_text, Mapping, ParsedValue};
use crate::record::{columns, normalize_column};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::thread;
use tracing::{info, warn};

pub const ENRICHED_HEADER: [&str; 11] = [
    "CIN",
    "COMPANY_NAME",
    "STATE",
    "STATUS",
    "SECTOR",
    "DIRECTORS",
    "COMPANY_TYPE",
    "REGISTERED_OFFICE",
    "SOURCE",
    "FIELD",
    "SOURCE_URL",
];

// ============================================================================
// ENRICHED RECORD
// ============================================================================

/// One row of the enriched dataset. Every column is text; unset is "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichedRecord {
    #[serde(rename = "CIN")]
    pub cin: String,

    #[serde(rename = "COMPANY_NAME")]
    pub company_name: String,

    #[serde(rename = "STATE")]
    pub state: String,

    /// Change type label, not a lifecycle status
    #[serde(rename = "STATUS")]
    pub status: String,

    #[serde(rename = "SECTOR")]
    pub sector: String,

    /// Semicolon-joined director names
    #[serde(rename = "DIRECTORS")]
    pub directors: String,

    #[serde(rename = "COMPANY_TYPE")]
    pub company_type: String,

    #[serde(rename = "REGISTERED_OFFICE")]
    pub registered_office: String,

    #[serde(rename = "SOURCE")]
    pub source: String,

    #[serde(rename = "FIELD")]
    pub field: String,

    #[serde(rename = "SOURCE_URL")]
    pub source_url: String,
}

/// Read an enriched dataset; columns missing from the file read as ""
pub fn load_enriched(path: &Path) -> PipelineResult<Vec<EnrichedRecord>> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers: csv::StringRecord = reader.headers()?.iter().map(normalize_column).collect();
    reader.set_headers(headers);

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: EnrichedRecord = result?;
        records.push(record);
    }

    Ok(records)
}

/// Publish the enriched dataset as a complete replacement
pub fn write_enriched(path: &Path, records: &[EnrichedRecord]) -> PipelineResult<()> {
    write_atomically(path, |out| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);
        writer.write_record(ENRICHED_HEADER)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    })
}

// ============================================================================
// BASE INFO
// ============================================================================

/// Context handed to the lookup for one entry.
///
/// Mapping payloads contribute their keys (uppercased); any other non-empty
/// NEW_VALUE is taken as the company name.
pub fn base_info(entry: &ChangeLogEntry) -> Mapping {
    let mut info: Mapping = match parse_new_value(&entry.new_value) {
        ParsedValue::Mapping(map) => map
            .into_iter()
            .map(|(k, v)| (normalize_column(&k), v))
            .collect(),
        ParsedValue::Empty => Mapping::new(),
        ParsedValue::Unstructured => {
            let mut map = Mapping::new();
            map.insert(
                columns::COMPANY_NAME.to_string(),
                Value::String(entry.new_value.clone()),
            );
            map
        }
    };

    if !info.contains_key(columns::STATE) {
        if let Some(state) = &entry.state {
            info.insert(columns::STATE.to_string(), Value::String(state.clone()));
        }
    }

    info
}

fn info_text(info: &Mapping, key: &str) -> String {
    info.get(key).map(value_text).unwrap_or_default()
}

// ============================================================================
// ENRICHMENT ENGINE
// ============================================================================

pub struct EnrichmentEngine {
    lookup: Box<dyn CompanyLookup>,
    sample_size: usize,
    placeholder_url_base: String,
}

impl EnrichmentEngine {
    pub fn new(lookup: Box<dyn CompanyLookup>, sample_size: usize) -> Self {
        EnrichmentEngine {
            lookup,
            sample_size,
            placeholder_url_base: crate::config::LookupConfig::default().placeholder_url_base,
        }
    }

    /// Engine with the lookup and sample size from configuration
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let lookup = build_lookup(&config.lookup)?;
        Ok(EnrichmentEngine {
            lookup,
            sample_size: config.sample_size,
            placeholder_url_base: config.lookup.placeholder_url_base.clone(),
        })
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn lookup_name(&self) -> &str {
        self.lookup.name()
    }

    /// Enrich one entry; the lookup pause is applied by `enrich`
    pub fn enrich_entry(&self, entry: &ChangeLogEntry) -> EnrichedRecord {
        let info = base_info(entry);
        let found = self.lookup.lookup(&entry.cin, &info);

        let company_name = Some(info_text(&info, columns::COMPANY_NAME))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| found.company_name.clone());

        let state = Some(info_text(&info, columns::STATE))
            .filter(|s| !s.is_empty())
            .or_else(|| entry.state.clone())
            .unwrap_or_default();

        let source_url = if found.source_url.is_empty() {
            placeholder_url(&self.placeholder_url_base, &entry.cin)
        } else {
            found.source_url.clone()
        };

        EnrichedRecord {
            cin: entry.cin.clone(),
            company_name,
            state,
            status: entry.change_type.label().to_string(),
            sector: found.sector.clone(),
            directors: found.directors_joined(),
            company_type: found.company_type.clone(),
            registered_office: found.registered_office.clone(),
            source: found.source,
            field: entry.field_changed.clone(),
            source_url,
        }
    }

    /// Enrich the newest `sample_size` entries of `log`
    pub fn enrich(&self, log: &ChangeLog) -> Vec<EnrichedRecord> {
        let mut ordered = log.clone();
        ordered.sort_newest_first();

        let sample: Vec<&ChangeLogEntry> =
            ordered.entries().iter().take(self.sample_size).collect();
        let pause = self.lookup.pause();

        info!(
            sample = sample.len(),
            total = log.len(),
            lookup = self.lookup.name(),
            "enriching change-log sample"
        );

        let mut enriched = Vec::with_capacity(sample.len());
        for entry in sample {
            enriched.push(self.enrich_entry(entry));
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }

        enriched
    }
}

/// Enrich the change log at `change_log` and publish to `output`.
///
/// Missing or empty change logs are skipped without error.
pub fn run_enrichment(
    engine: &EnrichmentEngine,
    change_log: &Path,
    output: &Path,
) -> PipelineResult<StageOutcome> {
    if !change_log.exists() {
        warn!(change_log = %change_log.display(), "change log not found; run change detection first");
        return Ok(StageOutcome::Skipped {
            reason: format!("change log not found: {}", change_log.display()),
        });
    }

    let log = ChangeLog::load(change_log)?;
    if log.is_empty() {
        info!("change log is empty; nothing to enrich");
        return Ok(StageOutcome::Skipped {
            reason: "change log is empty".to_string(),
        });
    }

    let records = engine.enrich(&log);
    write_enriched(output, &records)?;

    info!(output = %output.display(), records = records.len(), "enrichment complete");

    Ok(StageOutcome::Published {
        path: output.to_path_buf(),
        records: records.len(),
    })
}
