// 📊 Summary Generator - Daily counts by change type

use crate::artifact::write_atomically;
use crate::changelog::{ChangeLog, ChangeType};
use crate::error::{PipelineError, PipelineResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::info;

const RULE: &str = "------------------------------------------------------------";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub new_incorporations: usize,
    pub deregistered: usize,
    pub updated_records: usize,
    /// All entries, including labels not counted above
    pub total: usize,
}

impl SummaryCounts {
    pub fn from_log(log: &ChangeLog) -> Self {
        SummaryCounts {
            new_incorporations: log.count(&ChangeType::NewIncorporation),
            deregistered: log.count(&ChangeType::Deregistered),
            updated_records: log.count(&ChangeType::FieldUpdate),
            total: log.len(),
        }
    }

    /// Fixed-layout report text
    pub fn render(&self, date: NaiveDate) -> String {
        format!(
            "\nDaily Summary Report – {date}\n\
             {RULE}\n\
             New incorporations : {new}\n\
             Deregistered       : {dereg}\n\
             Updated records    : {updated}\n\
             {RULE}\n\
             Total changes      : {total}\n",
            date = date.format("%Y-%m-%d"),
            new = self.new_incorporations,
            dereg = self.deregistered,
            updated = self.updated_records,
            total = self.total,
        )
    }
}

/// Summarize the change log at `change_log` into `output`.
///
/// Unlike the other stages, a missing change log is an error here.
pub fn generate_summary(
    change_log: &Path,
    output: &Path,
    date: NaiveDate,
) -> PipelineResult<SummaryCounts> {
    if !change_log.exists() {
        return Err(PipelineError::MissingInput(change_log.to_path_buf()));
    }

    let log = ChangeLog::load(change_log)?;
    let counts = SummaryCounts::from_log(&log);
    let report = counts.render(date);

    write_atomically(output, |out| {
        out.write_all(report.as_bytes())?;
        Ok(())
    })?;

    info!(output = %output.display(), total = counts.total, "daily summary generated");

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::ChangeLogEntry;
    use std::fs;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
    }

    #[test]
    fn test_counts_by_type() {
        let log = ChangeLog::from_entries(vec![
            ChangeLogEntry::new_incorporation("B", "Y", date()),
            ChangeLogEntry::field_update("A", "STATUS", "Active", "Strike Off", date()),
            ChangeLogEntry::field_update("A", "PAID_UP_CAPITAL", "1", "2", date()),
            ChangeLogEntry::deregistered("C", "Z", date()),
        ]);

        let counts = SummaryCounts::from_log(&log);

        assert_eq!(
            counts,
            SummaryCounts {
                new_incorporations: 1,
                deregistered: 1,
                updated_records: 2,
                total: 4,
            }
        );
    }

    #[test]
    fn test_render_layout() {
        let counts = SummaryCounts {
            new_incorporations: 1,
            deregistered: 0,
            updated_records: 1,
            total: 2,
        };

        let text = counts.render(date());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "Daily Summary Report – 2024-06-02");
        assert_eq!(lines[2], RULE);
        assert_eq!(lines[3], "New incorporations : 1");
        assert_eq!(lines[4], "Deregistered       : 0");
        assert_eq!(lines[5], "Updated records    : 1");
        assert_eq!(lines[7], "Total changes      : 2");
    }

    #[test]
    fn test_missing_log_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("summary.txt");

        let err = generate_summary(&dir.path().join("log.csv"), &out, date()).unwrap_err();

        assert!(matches!(err, PipelineError::MissingInput(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_overwrites_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("log.csv");
        let out = dir.path().join("summary.txt");
        fs::write(&out, "old report").unwrap();
        ChangeLog::new().write(&log_path).unwrap();

        let counts = generate_summary(&log_path, &out, date()).unwrap();

        assert_eq!(counts.total, 0);
        assert!(fs::read_to_string(&out).unwrap().contains("Total changes      : 0"));
    }
}
