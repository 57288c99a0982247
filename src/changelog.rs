// 📜 Change Log - Detected differences between two master snapshots
// Persisted as CSV: CIN, CHANGE_TYPE, FIELD_CHANGED, OLD_VALUE, NEW_VALUE, DATE

use crate::artifact::write_atomically;
use crate::error::{PipelineError, PipelineResult};
use crate::record::normalize_column;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const HEADER: [&str; 6] = [
    "CIN",
    "CHANGE_TYPE",
    "FIELD_CHANGED",
    "OLD_VALUE",
    "NEW_VALUE",
    "DATE",
];

// ============================================================================
// CHANGE TYPE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeType {
    /// CIN present only in the new snapshot
    NewIncorporation,

    /// CIN present only in the old snapshot
    Deregistered,

    /// CIN in both snapshots with a watched field that differs
    FieldUpdate,

    /// Label not produced by this pipeline (kept verbatim)
    Other(String),
}

impl ChangeType {
    pub fn label(&self) -> &str {
        match self {
            ChangeType::NewIncorporation => "New Incorporation",
            ChangeType::Deregistered => "Deregistered",
            ChangeType::FieldUpdate => "Field Update",
            ChangeType::Other(label) => label.as_str(),
        }
    }
}

impl From<String> for ChangeType {
    fn from(label: String) -> Self {
        match label.trim() {
            "New Incorporation" => ChangeType::NewIncorporation,
            "Deregistered" => ChangeType::Deregistered,
            "Field Update" => ChangeType::FieldUpdate,
            _ => ChangeType::Other(label),
        }
    }
}

impl From<ChangeType> for String {
    fn from(change_type: ChangeType) -> Self {
        change_type.label().to_string()
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// CHANGE LOG ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    #[serde(rename = "CIN")]
    pub cin: String,

    #[serde(rename = "CHANGE_TYPE")]
    pub change_type: ChangeType,

    /// Empty unless this is a field update
    #[serde(rename = "FIELD_CHANGED", default)]
    pub field_changed: String,

    #[serde(rename = "OLD_VALUE", default)]
    pub old_value: String,

    /// Company name, field value, or a structured payload
    #[serde(rename = "NEW_VALUE", default)]
    pub new_value: String,

    #[serde(rename = "DATE", default)]
    pub date: String,

    /// Only present when the log file carries a STATE column
    #[serde(rename = "STATE", default, skip_serializing)]
    pub state: Option<String>,
}

impl ChangeLogEntry {
    pub fn new_incorporation(cin: &str, name: &str, date: NaiveDate) -> Self {
        ChangeLogEntry {
            cin: cin.to_string(),
            change_type: ChangeType::NewIncorporation,
            field_changed: String::new(),
            old_value: String::new(),
            new_value: name.to_string(),
            date: date.format(DATE_FORMAT).to_string(),
            state: None,
        }
    }

    pub fn deregistered(cin: &str, name: &str, date: NaiveDate) -> Self {
        ChangeLogEntry {
            cin: cin.to_string(),
            change_type: ChangeType::Deregistered,
            field_changed: String::new(),
            old_value: name.to_string(),
            new_value: String::new(),
            date: date.format(DATE_FORMAT).to_string(),
            state: None,
        }
    }

    pub fn field_update(
        cin: &str,
        field: &str,
        old_value: &str,
        new_value: &str,
        date: NaiveDate,
    ) -> Self {
        ChangeLogEntry {
            cin: cin.to_string(),
            change_type: ChangeType::FieldUpdate,
            field_changed: field.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            date: date.format(DATE_FORMAT).to_string(),
            state: None,
        }
    }

    /// Attach the company's state (kept in memory, not persisted)
    pub fn with_state(mut self, state: &str) -> Self {
        if !state.is_empty() {
            self.state = Some(state.to_string());
        }
        self
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }
}

// ============================================================================
// CHANGE LOG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    entries: Vec<ChangeLogEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ChangeLogEntry>) -> Self {
        ChangeLog { entries }
    }

    pub fn push(&mut self, entry: ChangeLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ChangeLogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ChangeLogEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, change_type: &ChangeType) -> usize {
        self.entries
            .iter()
            .filter(|e| &e.change_type == change_type)
            .count()
    }

    /// Stable sort, newest DATE first; undated entries go last
    pub fn sort_newest_first(&mut self) {
        self.entries
            .sort_by(|a, b| b.parsed_date().cmp(&a.parsed_date()));
    }

    /// Read a change log CSV; header names are normalized
    pub fn load(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: csv::StringRecord =
            reader.headers()?.iter().map(normalize_column).collect();
        if !headers.iter().any(|h| h == "CIN") {
            return Err(PipelineError::MissingColumn {
                path: path.to_path_buf(),
                column: "CIN".to_string(),
            });
        }
        reader.set_headers(headers);

        let mut entries = Vec::new();
        for result in reader.deserialize() {
            let entry: ChangeLogEntry = result?;
            entries.push(entry);
        }

        Ok(ChangeLog { entries })
    }

    /// Publish as CSV; an empty log still gets its header row
    pub fn write(&self, path: &Path) -> PipelineResult<()> {
        write_atomically(path, |out| {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(out);
            writer.write_record(HEADER)?;
            for entry in &self.entries {
                writer.serialize(entry)?;
            }
            writer.flush()?;
            Ok(())
        })
    }
}

impl FromIterator<ChangeLogEntry> for ChangeLog {
    fn from_iter<I: IntoIterator<Item = ChangeLogEntry>>(iter: I) -> Self {
        ChangeLog {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_change_type_labels() {
        assert_eq!(ChangeType::from("Field Update".to_string()), ChangeType::FieldUpdate);
        assert_eq!(ChangeType::NewIncorporation.to_string(), "New Incorporation");
        assert_eq!(
            ChangeType::from("Merged".to_string()),
            ChangeType::Other("Merged".to_string())
        );
    }

    #[test]
    fn test_write_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let log = ChangeLog::from_entries(vec![
            ChangeLogEntry::field_update("A", "STATUS", "Active", "Strike Off", day(2))
                .with_state("goa"),
            ChangeLogEntry::new_incorporation("B", "Y, Ltd", day(2)),
        ]);
        log.write(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "CIN,CHANGE_TYPE,FIELD_CHANGED,OLD_VALUE,NEW_VALUE,DATE\n\
             A,Field Update,STATUS,Active,Strike Off,2024-06-02\n\
             B,New Incorporation,,,\"Y, Ltd\",2024-06-02\n"
        );
    }

    #[test]
    fn test_empty_log_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        ChangeLog::new().write(&path).unwrap();

        let reloaded = ChangeLog::load(&path).unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_load_reads_optional_state_and_mixed_case_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(
            &path,
            "cin,Change_Type,Field_Changed,Old_Value,New_Value,Date,State\n\
             A,Deregistered,,Acme,,2024-06-01,goa\n\
             B,New Incorporation,,,Beta,2024-06-01,\n",
        )
        .unwrap();

        let log = ChangeLog::load(&path).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].change_type, ChangeType::Deregistered);
        assert_eq!(log.entries()[0].state.as_deref(), Some("goa"));
        assert_eq!(log.entries()[1].state, None);
    }

    #[test]
    fn test_sort_newest_first_is_stable() {
        let mut log = ChangeLog::from_entries(vec![
            ChangeLogEntry::new_incorporation("old", "", day(1)),
            ChangeLogEntry::new_incorporation("new-1", "", day(3)),
            ChangeLogEntry::new_incorporation("mid", "", day(2)),
            ChangeLogEntry::new_incorporation("new-2", "", day(3)),
        ]);

        log.sort_newest_first();

        let order: Vec<&str> = log.entries().iter().map(|e| e.cin.as_str()).collect();
        assert_eq!(order, vec!["new-1", "new-2", "mid", "old"]);
    }

    #[test]
    fn test_missing_log_is_missing_input() {
        let err = ChangeLog::load(Path::new("/nonexistent/log.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }
}
