// 🔎 Company Lookup - Swappable enrichment capability
//
// Two implementations behind one trait, chosen by configuration:
// - HeuristicLookup: derives attributes from the record itself
// - RemoteLookup: HTTP call per CIN, bounded by a timeout
//
// A lookup never fails. Errors become LookupResult::fallback().

use crate::config::{LookupConfig, LookupMode};
use crate::error::{PipelineError, PipelineResult};
use crate::payload::{value_text, Mapping};
use crate::record::columns;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const HEURISTIC_SOURCE: &str = "Heuristic";
pub const FALLBACK_SOURCE: &str = "Fallback";
pub const DEFAULT_COMPANY_TYPE: &str = "Private Limited";

// ============================================================================
// LOOKUP RESULT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    /// Name reported by the source, if any
    pub company_name: String,
    pub sector: String,
    pub directors: Vec<String>,
    pub company_type: String,
    pub registered_office: String,
    pub source_url: String,

    /// Label of the source that produced this result
    pub source: String,
}

impl LookupResult {
    /// Result used when a lookup could not complete
    pub fn fallback() -> Self {
        LookupResult {
            source: FALLBACK_SOURCE.to_string(),
            ..Default::default()
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }

    pub fn directors_joined(&self) -> String {
        self.directors.join("; ")
    }
}

// ============================================================================
// LOOKUP CAPABILITY
// ============================================================================

/// CompanyLookup - attributes for one CIN
///
/// Implementations must absorb every failure and return a result.
pub trait CompanyLookup: Send + Sync {
    fn lookup(&self, cin: &str, base_info: &Mapping) -> LookupResult;

    /// Wait applied after each lookup
    fn pause(&self) -> Duration {
        Duration::ZERO
    }

    fn name(&self) -> &str;
}

/// Factory: the lookup selected by `config.mode`
pub fn build_lookup(config: &LookupConfig) -> PipelineResult<Box<dyn CompanyLookup>> {
    match config.mode {
        LookupMode::Heuristic => Ok(Box::new(HeuristicLookup::new(&config.placeholder_url_base))),
        LookupMode::Remote => Ok(Box::new(RemoteLookup::new(config)?)),
    }
}

/// Deterministic reference URL for a CIN
pub fn placeholder_url(base: &str, cin: &str) -> String {
    format!("{}{}", base, urlencoding::encode(cin))
}

/// Broad sector from the two leading characters of an industry code
///
/// <10 Agriculture, 10-39 Manufacturing, 40-69 Services, else Other;
/// absent or unparseable codes are Unknown.
pub fn sector_for_nic(code: Option<&str>) -> &'static str {
    let prefix: Option<i64> = code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .and_then(|c| c.chars().take(2).collect::<String>().trim().parse().ok());

    match prefix {
        None => "Unknown",
        Some(n) if n < 10 => "Agriculture",
        Some(n) if n < 40 => "Manufacturing",
        Some(n) if n < 70 => "Services",
        Some(_) => "Other",
    }
}

/// Non-empty text of the first key present in `base_info`
fn first_text(base_info: &Mapping, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| base_info.get(*k))
        .map(value_text)
        .find(|v| !v.trim().is_empty())
}

// ============================================================================
// HEURISTIC LOOKUP
// ============================================================================

pub struct HeuristicLookup {
    placeholder_url_base: String,
}

impl HeuristicLookup {
    pub fn new(placeholder_url_base: &str) -> Self {
        HeuristicLookup {
            placeholder_url_base: placeholder_url_base.to_string(),
        }
    }
}

impl Default for HeuristicLookup {
    fn default() -> Self {
        Self::new(&LookupConfig::default().placeholder_url_base)
    }
}

impl CompanyLookup for HeuristicLookup {
    fn lookup(&self, cin: &str, base_info: &Mapping) -> LookupResult {
        let nic = first_text(base_info, &[columns::NIC_CODE, columns::NIC]);
        let suffix: String = {
            let chars: Vec<char> = cin.chars().collect();
            chars[chars.len().saturating_sub(3)..].iter().collect()
        };

        LookupResult {
            company_name: String::new(),
            sector: sector_for_nic(nic.as_deref()).to_string(),
            directors: vec![format!("Director {}A", suffix), format!("Director {}B", suffix)],
            company_type: first_text(base_info, &[columns::COMPANY_CLASS, columns::COMPANY_TYPE])
                .unwrap_or_else(|| DEFAULT_COMPANY_TYPE.to_string()),
            registered_office: first_text(base_info, &[columns::REGISTERED_OFFICE_ADDRESS])
                .unwrap_or_default(),
            source_url: placeholder_url(&self.placeholder_url_base, cin),
            source: HEURISTIC_SOURCE.to_string(),
        }
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

// ============================================================================
// REMOTE LOOKUP
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),
}

/// Response body of the remote company endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteCompany {
    company_name: Option<String>,
    sector: Option<String>,
    directors: Option<Vec<String>>,
    company_type: Option<String>,
    registered_office: Option<String>,
}

pub struct RemoteLookup {
    client: reqwest::blocking::Client,
    base_url: String,
    source_label: String,
    pause: Duration,
}

impl RemoteLookup {
    pub fn new(config: &LookupConfig) -> PipelineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {}", e)))?;

        Ok(RemoteLookup {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            source_label: config.source_label.clone(),
            pause: config.request_pause(),
        })
    }

    pub fn url_for(&self, cin: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(cin))
    }

    fn fetch(&self, cin: &str) -> Result<LookupResult, LookupError> {
        let url = self.url_for(cin);
        let response = self.client.get(&url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body: RemoteCompany = response.json()?;
        Ok(LookupResult {
            company_name: body.company_name.unwrap_or_default(),
            sector: body.sector.unwrap_or_default(),
            directors: body.directors.unwrap_or_default(),
            company_type: body.company_type.unwrap_or_default(),
            registered_office: body.registered_office.unwrap_or_default(),
            source_url: url,
            source: self.source_label.clone(),
        })
    }
}

impl CompanyLookup for RemoteLookup {
    fn lookup(&self, cin: &str, _base_info: &Mapping) -> LookupResult {
        match self.fetch(cin) {
            Ok(result) => {
                debug!(cin, source = %result.source, "remote lookup succeeded");
                result
            }
            Err(e) => {
                warn!(cin, error = %e, "remote lookup failed; using fallback");
                LookupResult::fallback()
            }
        }
    }

    fn pause(&self) -> Duration {
        self.pause
    }

    fn name(&self) -> &str {
        "remote"
    }
}
