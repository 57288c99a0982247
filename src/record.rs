// 🏢 Company Records & Master Dataset
// Records keep every source column as text; absent values read as "".

use crate::artifact::write_atomically;
use crate::error::{PipelineError, PipelineResult};
use std::collections::HashMap;
use std::path::Path;

/// Canonical column names (already normalized)
pub mod columns {
    pub const CIN: &str = "CIN";
    pub const COMPANY_NAME: &str = "COMPANY_NAME";
    pub const STATE: &str = "STATE";
    pub const STATUS: &str = "STATUS";
    pub const AUTHORIZED_CAPITAL: &str = "AUTHORIZED_CAPITAL";
    pub const PAID_UP_CAPITAL: &str = "PAID_UP_CAPITAL";
    pub const REGISTERED_OFFICE_ADDRESS: &str = "REGISTERED_OFFICE_ADDRESS";
    pub const NIC_CODE: &str = "NIC_CODE";
    pub const NIC: &str = "NIC";
    pub const COMPANY_CLASS: &str = "COMPANY_CLASS";
    pub const COMPANY_TYPE: &str = "COMPANY_TYPE";

    /// Fields compared for records present in both snapshots
    pub const WATCHED: [&str; 3] = [STATUS, AUTHORIZED_CAPITAL, PAID_UP_CAPITAL];
}

/// Trim and uppercase a source column name
pub fn normalize_column(name: &str) -> String {
    name.trim_start_matches('\u{feff}').trim().to_uppercase()
}

// ============================================================================
// COMPANY RECORD
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyRecord {
    fields: HashMap<String, String>,
}

impl CompanyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (column, value) pairs; column names are normalized
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (k, v) in pairs {
            record.set(k.as_ref(), v);
        }
        record
    }

    /// Value of `column`, or "" when the record has none
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.fields.insert(normalize_column(column), value.into());
    }

    pub fn has(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn cin(&self) -> &str {
        self.get(columns::CIN)
    }

    pub fn name(&self) -> &str {
        self.get(columns::COMPANY_NAME)
    }

    pub fn state(&self) -> &str {
        self.get(columns::STATE)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

// ============================================================================
// MASTER DATASET
// ============================================================================

/// Ordered records of one point in time plus the ordered column list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterDataset {
    columns: Vec<String>,
    records: Vec<CompanyRecord>,
}

impl MasterDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dataset = Self::new();
        for c in columns {
            dataset.add_column(c.as_ref());
        }
        dataset
    }

    /// Register a column if not already present (first-seen order)
    pub fn add_column(&mut self, column: &str) {
        let column = normalize_column(column);
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
    }

    /// Append a record; columns it introduces are registered in sorted order
    pub fn push(&mut self, record: CompanyRecord) {
        let mut unseen: Vec<String> = record
            .columns()
            .filter(|c| !self.columns.iter().any(|known| known == c))
            .map(str::to_string)
            .collect();
        unseen.sort();
        self.columns.extend(unseen);
        self.records.push(record);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[CompanyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record for each CIN, keyed by CIN
    pub fn index_by_cin(&self) -> HashMap<&str, &CompanyRecord> {
        let mut index = HashMap::with_capacity(self.records.len());
        for record in &self.records {
            index.entry(record.cin()).or_insert(record);
        }
        index
    }

    /// Distinct CINs in first-occurrence order
    pub fn cins(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .map(CompanyRecord::cin)
            .filter(|cin| seen.insert(*cin))
            .collect()
    }

    /// Read a master dataset CSV; requires a CIN column
    pub fn load(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }

        let dataset = read_table(path)?;
        if !dataset.columns.iter().any(|c| c == columns::CIN) {
            return Err(PipelineError::MissingColumn {
                path: path.to_path_buf(),
                column: columns::CIN.to_string(),
            });
        }

        Ok(dataset)
    }

    /// Publish the dataset as CSV, header = column list
    pub fn write(&self, path: &Path) -> PipelineResult<()> {
        write_atomically(path, |out| {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(&self.columns)?;
            for record in &self.records {
                writer.write_record(self.columns.iter().map(|c| record.get(c)))?;
            }
            writer.flush()?;
            Ok(())
        })
    }
}

/// Read any CSV into a dataset, normalizing headers and padding short rows
pub(crate) fn read_table(path: &Path) -> PipelineResult<MasterDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_column).collect();
    let mut dataset =
        MasterDataset::with_columns(headers.iter().filter(|h| !h.is_empty()));

    for result in reader.records() {
        let row = result?;
        let mut record = CompanyRecord::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() || record.has(header) {
                continue;
            }
            record.set(header, row.get(i).unwrap_or(""));
        }
        dataset.records.push(record);
    }

    Ok(dataset)
}
