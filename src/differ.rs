// 🔀 Snapshot Differ - Three-way classification of two master snapshots
//
//   new_only = ids(new) − ids(old)  → New Incorporation
//   old_only = ids(old) − ids(new)  → Deregistered
//   common   = ids(old) ∩ ids(new)  → Field Update per differing watched field
//
// Entry order is deterministic: new-only (new order), old-only (old order),
// then field updates (new order, watch-list order per record).

use crate::artifact::StageOutcome;
use crate::changelog::{ChangeLog, ChangeLogEntry};
use crate::error::PipelineResult;
use crate::record::{columns, CompanyRecord, MasterDataset};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// VALUE COMPARISON
// ============================================================================

/// How watched field values are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueComparison {
    /// Raw string equality ("100.0" != "100")
    #[default]
    Text,

    /// Values that both parse as finite numbers compare numerically;
    /// anything else falls back to text
    Numeric,
}

impl ValueComparison {
    pub fn differs(&self, old: &str, new: &str) -> bool {
        match self {
            ValueComparison::Text => old != new,
            ValueComparison::Numeric => match (parse_number(old), parse_number(new)) {
                (Some(a), Some(b)) => a != b,
                _ => old != new,
            },
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

// ============================================================================
// KEY PARTITION
// ============================================================================

/// Disjoint split of `ids(old) ∪ ids(new)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPartition<'a> {
    pub new_only: Vec<&'a str>,
    pub old_only: Vec<&'a str>,
    pub common: Vec<&'a str>,
}

impl<'a> KeyPartition<'a> {
    /// Records with an empty CIN are not keyed and never appear
    pub fn of(old: &'a MasterDataset, new: &'a MasterDataset) -> Self {
        let old_ids: Vec<&str> = old.cins().into_iter().filter(|c| !c.is_empty()).collect();
        let new_ids: Vec<&str> = new.cins().into_iter().filter(|c| !c.is_empty()).collect();
        let old_set: HashSet<&str> = old_ids.iter().copied().collect();
        let new_set: HashSet<&str> = new_ids.iter().copied().collect();

        let mut partition = KeyPartition::default();
        for &id in &new_ids {
            if old_set.contains(id) {
                partition.common.push(id);
            } else {
                partition.new_only.push(id);
            }
        }
        partition.old_only = old_ids
            .into_iter()
            .filter(|id| !new_set.contains(id))
            .collect();

        partition
    }

    pub fn len(&self) -> usize {
        self.new_only.len() + self.old_only.len() + self.common.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SNAPSHOT DIFFER
// ============================================================================

#[derive(Debug, Clone)]
pub struct SnapshotDiffer {
    watched_fields: Vec<String>,
    comparison: ValueComparison,
}

impl SnapshotDiffer {
    /// Differ over STATUS, AUTHORIZED_CAPITAL, PAID_UP_CAPITAL with text comparison
    pub fn new() -> Self {
        SnapshotDiffer {
            watched_fields: columns::WATCHED.iter().map(|f| f.to_string()).collect(),
            comparison: ValueComparison::Text,
        }
    }

    /// Watch list and comparison mode from configuration
    pub fn from_config(config: &crate::config::PipelineConfig) -> Self {
        SnapshotDiffer::new()
            .with_fields(&config.watched_fields)
            .with_comparison(config.comparison)
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.watched_fields = fields
            .into_iter()
            .map(|f| crate::record::normalize_column(f.as_ref()))
            .collect();
        self
    }

    pub fn with_comparison(mut self, comparison: ValueComparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn watched_fields(&self) -> &[String] {
        &self.watched_fields
    }

    /// Compare two snapshots and produce the change log for `date`
    pub fn diff(&self, old: &MasterDataset, new: &MasterDataset, date: NaiveDate) -> ChangeLog {
        let old_index = old.index_by_cin();
        let new_index = new.index_by_cin();
        let partition = KeyPartition::of(old, new);

        let mut log = ChangeLog::new();

        for cin in &partition.new_only {
            let record = new_index[cin];
            log.push(
                ChangeLogEntry::new_incorporation(cin, record.name(), date)
                    .with_state(record.state()),
            );
        }

        for cin in &partition.old_only {
            let record = old_index[cin];
            log.push(
                ChangeLogEntry::deregistered(cin, record.name(), date).with_state(record.state()),
            );
        }

        for cin in &partition.common {
            for entry in self.field_updates(old_index[cin], new_index[cin], date) {
                log.push(entry);
            }
        }

        log
    }

    /// One entry per watched field whose value differs; none if all match
    pub fn field_updates(
        &self,
        old: &CompanyRecord,
        new: &CompanyRecord,
        date: NaiveDate,
    ) -> Vec<ChangeLogEntry> {
        self.watched_fields
            .iter()
            .filter(|field| self.comparison.differs(old.get(field), new.get(field)))
            .map(|field| {
                ChangeLogEntry::field_update(new.cin(), field, old.get(field), new.get(field), date)
                    .with_state(new.state())
            })
            .collect()
    }
}

impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Load both snapshots, diff them and publish the change log.
///
/// A missing snapshot is reported and skipped, not an error.
pub fn run_change_detection(
    differ: &SnapshotDiffer,
    old_path: &Path,
    new_path: &Path,
    output: &Path,
    date: NaiveDate,
) -> PipelineResult<StageOutcome> {
    for snapshot in [old_path, new_path] {
        if !snapshot.exists() {
            warn!(snapshot = %snapshot.display(), "missing snapshot file; change detection skipped");
            return Ok(StageOutcome::Skipped {
                reason: format!("missing snapshot file: {}", snapshot.display()),
            });
        }
    }

    let old = MasterDataset::load(old_path)?;
    let new = MasterDataset::load(new_path)?;
    let log = differ.diff(&old, &new, date);

    if log.is_empty() {
        info!("no changes detected between snapshots");
    }
    log.write(output)?;

    info!(
        output = %output.display(),
        total = log.len(),
        "change detection complete"
    );

    Ok(StageOutcome::Published {
        path: output.to_path_buf(),
        records: log.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::ChangeType;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
    }

    fn dataset(rows: &[&[(&str, &str)]]) -> MasterDataset {
        let mut dataset = MasterDataset::new();
        for row in rows {
            dataset.push(CompanyRecord::from_pairs(row.iter().copied()));
        }
        dataset
    }

    #[test]
    fn test_three_way_classification() {
        let old = dataset(&[
            &[("CIN", "A"), ("COMPANY_NAME", "X"), ("STATUS", "Active")],
            &[("CIN", "C"), ("COMPANY_NAME", "Gone"), ("STATUS", "Active")],
        ]);
        let new = dataset(&[
            &[("CIN", "A"), ("COMPANY_NAME", "X"), ("STATUS", "Strike Off")],
            &[("CIN", "B"), ("COMPANY_NAME", "Y"), ("STATE", "goa")],
        ]);

        let log = SnapshotDiffer::new().diff(&old, &new, date());
        let entries = log.entries();

        assert_eq!(log.len(), 3);
        assert_eq!(entries[0].change_type, ChangeType::NewIncorporation);
        assert_eq!(entries[0].cin, "B");
        assert_eq!(entries[0].new_value, "Y");
        assert_eq!(entries[0].state.as_deref(), Some("goa"));

        assert_eq!(entries[1].change_type, ChangeType::Deregistered);
        assert_eq!(entries[1].old_value, "Gone");
        assert_eq!(entries[1].new_value, "");

        assert_eq!(entries[2].change_type, ChangeType::FieldUpdate);
        assert_eq!(entries[2].field_changed, "STATUS");
        assert_eq!(entries[2].old_value, "Active");
        assert_eq!(entries[2].new_value, "Strike Off");
        assert_eq!(entries[2].date, "2024-06-02");
    }

    #[test]
    fn test_multiple_field_updates_in_watch_order() {
        let old = dataset(&[&[
            ("CIN", "A"),
            ("STATUS", "Active"),
            ("AUTHORIZED_CAPITAL", "100"),
            ("PAID_UP_CAPITAL", "50"),
        ]]);
        let new = dataset(&[&[
            ("CIN", "A"),
            ("STATUS", "Active"),
            ("AUTHORIZED_CAPITAL", "200"),
            ("PAID_UP_CAPITAL", "75"),
        ]]);

        let log = SnapshotDiffer::new().diff(&old, &new, date());
        let fields: Vec<&str> = log.entries().iter().map(|e| e.field_changed.as_str()).collect();

        assert_eq!(fields, vec!["AUTHORIZED_CAPITAL", "PAID_UP_CAPITAL"]);
    }

    #[test]
    fn test_unchanged_record_emits_nothing() {
        let rows: &[&[(&str, &str)]] = &[&[("CIN", "A"), ("STATUS", "Active"), ("COMPANY_NAME", "X")]];
        let log = SnapshotDiffer::new().diff(&dataset(rows), &dataset(rows), date());

        assert!(log.is_empty());
    }

    #[test]
    fn test_unwatched_field_ignored() {
        let old = dataset(&[&[("CIN", "A"), ("COMPANY_NAME", "Old Name")]]);
        let new = dataset(&[&[("CIN", "A"), ("COMPANY_NAME", "New Name")]]);

        assert!(SnapshotDiffer::new().diff(&old, &new, date()).is_empty());
    }

    #[test]
    fn test_text_vs_numeric_comparison() {
        let old = dataset(&[&[("CIN", "A"), ("PAID_UP_CAPITAL", "100.0")]]);
        let new = dataset(&[&[("CIN", "A"), ("PAID_UP_CAPITAL", "100")]]);

        let text = SnapshotDiffer::new().diff(&old, &new, date());
        let numeric = SnapshotDiffer::new()
            .with_comparison(ValueComparison::Numeric)
            .diff(&old, &new, date());

        assert_eq!(text.len(), 1);
        assert!(numeric.is_empty());
        assert!(ValueComparison::Numeric.differs("Active", "Strike Off"));
    }

    #[test]
    fn test_missing_snapshot_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("day1.csv");
        let new = dir.path().join("day2.csv");
        let out = dir.path().join("log.csv");
        std::fs::write(&new, "CIN\nA\n").unwrap();

        let outcome = run_change_detection(&SnapshotDiffer::new(), &old, &new, &out, date()).unwrap();

        assert!(!outcome.is_published());
        assert!(!out.exists());
    }

    fn ids_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
        prop::collection::vec((0u8..20, 0u8..3), 0..15)
    }

    fn from_ids(ids: &[(u8, u8)]) -> MasterDataset {
        let mut dataset = MasterDataset::new();
        for (id, status) in ids {
            dataset.push(CompanyRecord::from_pairs([
                ("CIN", format!("C{}", id)),
                ("STATUS", format!("S{}", status)),
            ]));
        }
        dataset
    }

    proptest! {
        #[test]
        fn prop_partition_is_exact(old_ids in ids_strategy(), new_ids in ids_strategy()) {
            let old = from_ids(&old_ids);
            let new = from_ids(&new_ids);
            let partition = KeyPartition::of(&old, &new);

            let union: HashSet<&str> = old.cins().into_iter().chain(new.cins()).collect();
            let mut seen = HashSet::new();
            for id in partition.new_only.iter().chain(&partition.old_only).chain(&partition.common) {
                prop_assert!(seen.insert(*id), "id {} in two classes", id);
            }
            prop_assert_eq!(seen, union);
        }

        #[test]
        fn prop_field_update_iff_text_differs(old_ids in ids_strategy(), new_ids in ids_strategy()) {
            let old = from_ids(&old_ids);
            let new = from_ids(&new_ids);
            let log = SnapshotDiffer::new().diff(&old, &new, date());
            let old_index = old.index_by_cin();
            let new_index = new.index_by_cin();

            for cin in KeyPartition::of(&old, &new).common {
                let changed = old_index[cin].get("STATUS") != new_index[cin].get("STATUS");
                let updates = log
                    .entries()
                    .iter()
                    .filter(|e| e.cin == cin && e.change_type == ChangeType::FieldUpdate)
                    .count();
                prop_assert_eq!(updates, usize::from(changed));
            }
        }
    }
}
