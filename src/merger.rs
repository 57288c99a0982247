// 🗂️ State-Data Merger
// One CSV per state → one deduplicated master dataset.
//
// Unreadable files are skipped with a warning; only a directory with no
// usable file at all fails the run.

use crate::error::{PipelineError, PipelineResult};
use crate::record::{columns, read_table, CompanyRecord, MasterDataset};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a merge run saw and produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub files_found: usize,
    pub files_merged: Vec<String>,
    pub files_skipped: Vec<String>,
    pub rows_read: usize,
    pub rows_without_cin: usize,
    pub duplicates_dropped: usize,
    pub total_records: usize,
}

/// State name for a source file: its base name without extension
pub fn state_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// List `*.csv` files in `dir`, sorted by file name
pub fn list_state_files(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingInput(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    Ok(files)
}

/// Read one state file and tag every row with its state
pub fn load_state_file(path: &Path) -> PipelineResult<MasterDataset> {
    let table = read_table(path)?;
    if !table.columns().iter().any(|c| c == columns::CIN) {
        return Err(PipelineError::MissingColumn {
            path: path.to_path_buf(),
            column: columns::CIN.to_string(),
        });
    }

    let state = state_from_path(path);
    let mut tagged = MasterDataset::with_columns(table.columns());
    tagged.add_column(columns::STATE);

    for record in table.records() {
        let mut record = record.clone();
        record.set(columns::STATE, state.as_str());
        tagged.push(record);
    }

    Ok(tagged)
}

/// Merge every state file under `dir` into one master dataset
pub fn merge_state_dir(dir: &Path) -> PipelineResult<(MasterDataset, MergeReport)> {
    let files = list_state_files(dir)?;
    let mut report = MergeReport {
        files_found: files.len(),
        ..Default::default()
    };

    info!(dir = %dir.display(), files = files.len(), "found state files");

    let mut sources = Vec::new();
    for path in &files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match load_state_file(path) {
            Ok(table) => {
                info!(file = %file_name, records = table.len(), "processed state file");
                report.files_merged.push(file_name);
                sources.push(table);
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "skipping unreadable state file");
                report.files_skipped.push(file_name);
            }
        }
    }

    if sources.is_empty() {
        return Err(PipelineError::NoSourceFiles(dir.to_path_buf()));
    }

    let master = concat_dedup(&sources, &mut report);
    report.total_records = master.len();

    Ok((master, report))
}

/// Concatenate sources in order and keep the first record per CIN
fn concat_dedup(sources: &[MasterDataset], report: &mut MergeReport) -> MasterDataset {
    let mut master = MasterDataset::new();
    for source in sources {
        for column in source.columns() {
            master.add_column(column);
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    for record in sources.iter().flat_map(|s| s.records()) {
        report.rows_read += 1;

        let cin = record.cin();
        if cin.trim().is_empty() {
            report.rows_without_cin += 1;
            continue;
        }
        if !seen.insert(cin.to_string()) {
            report.duplicates_dropped += 1;
            continue;
        }

        master.push(fill_missing(record, master.columns()));
    }

    master
}

/// Copy of `record` with an explicit "" for every column it lacks
fn fill_missing(record: &CompanyRecord, columns: &[String]) -> CompanyRecord {
    let mut filled = record.clone();
    for column in columns {
        if !filled.has(column) {
            filled.set(column, "");
        }
    }
    filled
}

/// Merge and publish the master dataset
pub fn run_merge(state_dir: &Path, output: &Path) -> PipelineResult<MergeReport> {
    let (master, report) = merge_state_dir(state_dir)?;
    master.write(output)?;

    info!(
        output = %output.display(),
        total = report.total_records,
        duplicates = report.duplicates_dropped,
        "master dataset created"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_state(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_state_from_path() {
        assert_eq!(state_from_path(Path::new("data/Maharashtra.csv")), "Maharashtra");
    }

    #[test]
    fn test_merge_normalizes_tags_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        write_state(
            dir.path(),
            "goa.csv",
            " cin ,company_name,Status\nU1,Acme,Active\nU2,Beta,Active\n",
        );
        write_state(
            dir.path(),
            "kerala.csv",
            "CIN,COMPANY_NAME,STATUS,NIC_CODE\nU2,Beta Kerala,Active,25\nU3,Gamma,Strike Off,55\n",
        );

        let (master, report) = merge_state_dir(dir.path()).unwrap();

        assert_eq!(master.len(), 3);
        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(
            master.columns(),
            ["CIN", "COMPANY_NAME", "STATUS", "STATE", "NIC_CODE"]
        );

        let index = master.index_by_cin();
        assert_eq!(index["U2"].name(), "Beta");
        assert_eq!(index["U2"].state(), "goa");
        assert_eq!(index["U3"].state(), "kerala");
        // Column absent in goa.csv is an explicit empty value
        assert!(index["U1"].has("NIC_CODE"));
        assert_eq!(index["U1"].get("NIC_CODE"), "");
    }

    #[test]
    fn test_bad_file_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_state(dir.path(), "goa.csv", "CIN,COMPANY_NAME\nU1,Acme\n");
        write_state(dir.path(), "broken.csv", "NAME_ONLY\nnope\n");
        write_state(dir.path(), "notes.txt", "ignored");

        let (master, report) = merge_state_dir(dir.path()).unwrap();

        assert_eq!(master.len(), 1);
        assert_eq!(report.files_found, 2);
        assert_eq!(report.files_skipped, vec!["broken.csv".to_string()]);
    }

    #[test]
    fn test_rows_without_cin_dropped() {
        let dir = tempfile::tempdir().unwrap();
        write_state(dir.path(), "goa.csv", "CIN,COMPANY_NAME\n,Nameless\nU1,Acme\n");

        let (master, report) = merge_state_dir(dir.path()).unwrap();

        assert_eq!(master.len(), 1);
        assert_eq!(report.rows_without_cin, 1);
    }

    #[test]
    fn test_empty_dir_is_error_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("master.csv");

        let err = run_merge(dir.path(), &output).unwrap_err();

        assert!(matches!(err, PipelineError::NoSourceFiles(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let states = dir.path().join("states");
        fs::create_dir(&states).unwrap();
        write_state(&states, "b.csv", "CIN,COMPANY_NAME\nU2,Beta\nU1,Dup\n");
        write_state(&states, "a.csv", "CIN,COMPANY_NAME,STATUS\nU1,Acme,Active\n");

        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        let r1 = run_merge(&states, &first).unwrap();
        let r2 = run_merge(&states, &second).unwrap();

        assert_eq!(r1.total_records, r2.total_records);
        assert_eq!(
            fs::read_to_string(&first).unwrap(),
            fs::read_to_string(&second).unwrap()
        );
    }
}
