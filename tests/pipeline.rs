// End-to-end pipeline: merge → diff → enrich → summary

use chrono::NaiveDate;
use registry_insights::{
    file_digest, generate_summary, load_enriched, run_change_detection, run_enrichment,
    run_merge, ChangeLog, ChangeType, EnrichmentEngine, HeuristicLookup, MasterDataset,
    RunEvent, RunHistory, SnapshotDiffer, Stage, StageOutcome, ENRICHED_HEADER,
};
use std::fs;
use std::path::Path;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[test]
fn test_status_change_and_new_company_flow_through_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let old = root.join("data_snapshot/day1_master_dataset.csv");
    let new = root.join("data_snapshot/day2_master_dataset.csv");
    let log_path = root.join("output/daily_change_log.csv");
    let enriched_path = root.join("output/enriched_dataset.csv");
    let summary_path = root.join("output/daily_summary.txt");

    write(
        &old,
        "CIN,COMPANY_NAME,STATUS,AUTHORIZED_CAPITAL,PAID_UP_CAPITAL,STATE\n\
         A,X,Active,100,50,goa\n",
    );
    write(
        &new,
        "CIN,COMPANY_NAME,STATUS,AUTHORIZED_CAPITAL,PAID_UP_CAPITAL,STATE\n\
         A,X,Strike Off,100,50,goa\n\
         B,Y,Active,200,100,kerala\n",
    );

    // Stage 2
    let outcome =
        run_change_detection(&SnapshotDiffer::new(), &old, &new, &log_path, date()).unwrap();
    assert_eq!(outcome.records(), 2);

    let log = ChangeLog::load(&log_path).unwrap();
    assert_eq!(log.count(&ChangeType::FieldUpdate), 1);
    assert_eq!(log.count(&ChangeType::NewIncorporation), 1);
    assert_eq!(log.count(&ChangeType::Deregistered), 0);

    let update = log
        .entries()
        .iter()
        .find(|e| e.change_type == ChangeType::FieldUpdate)
        .unwrap();
    assert_eq!(update.cin, "A");
    assert_eq!(update.field_changed, "STATUS");
    assert_eq!(update.old_value, "Active");
    assert_eq!(update.new_value, "Strike Off");
    assert_eq!(update.date, "2024-06-02");

    // Stage 4
    let counts = generate_summary(&log_path, &summary_path, date()).unwrap();
    assert_eq!(
        (counts.new_incorporations, counts.deregistered, counts.updated_records, counts.total),
        (1, 0, 1, 2)
    );
    let report = fs::read_to_string(&summary_path).unwrap();
    assert!(report.contains("Daily Summary Report – 2024-06-02"));
    assert!(report.contains("Total changes      : 2"));

    // Stage 3
    let engine = EnrichmentEngine::new(Box::new(HeuristicLookup::default()), 50);
    let outcome = run_enrichment(&engine, &log_path, &enriched_path).unwrap();
    assert!(outcome.is_published());

    let text = fs::read_to_string(&enriched_path).unwrap();
    assert_eq!(text.lines().next().unwrap(), ENRICHED_HEADER.join(","));

    let rows = load_enriched(&enriched_path).unwrap();
    assert_eq!(rows.len(), 2);

    let incorporated = rows.iter().find(|r| r.cin == "B").unwrap();
    assert_eq!(incorporated.company_name, "Y");
    assert_eq!(incorporated.status, "New Incorporation");
    assert_eq!(incorporated.source, "Heuristic");
    assert!(!incorporated.source_url.is_empty());

    let updated = rows.iter().find(|r| r.cin == "A").unwrap();
    assert_eq!(updated.status, "Field Update");
    assert_eq!(updated.field, "STATUS");

    let mut reader = csv::Reader::from_path(&enriched_path).unwrap();
    for record in reader.records() {
        assert_eq!(record.unwrap().len(), ENRICHED_HEADER.len());
    }
}

#[test]
fn test_merge_is_idempotent_and_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let states = dir.path().join("state_data");
    let master = dir.path().join("output/master_dataset.csv");

    write(
        &states.join("maharashtra.csv"),
        " cin ,Company_Name,Status\nU1,Acme,Active\nU1,Acme,Active\nU2,Bharat,Active\n",
    );
    write(
        &states.join("goa.csv"),
        "CIN,COMPANY_NAME,PAID_UP_CAPITAL\nU3,Coastal,500\n",
    );

    let report = run_merge(&states, &master).unwrap();
    assert_eq!(report.total_records, 3);
    assert_eq!(report.duplicates_dropped, 1);
    let first = file_digest(&master).unwrap();

    let history = RunHistory::open(&dir.path().join("output/history.db")).unwrap();
    history
        .record(&RunEvent::for_artifact(Stage::Merge, &master, report.total_records).unwrap())
        .unwrap();

    run_merge(&states, &master).unwrap();
    assert_eq!(file_digest(&master).unwrap(), first);

    history
        .record(&RunEvent::for_artifact(Stage::Merge, &master, report.total_records).unwrap())
        .unwrap();
    let recent = history.recent(5).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].digest, recent[1].digest);

    let dataset = MasterDataset::load(&master).unwrap();
    assert!(dataset.columns().iter().any(|c| c == "STATE"));
    assert!(dataset.columns().iter().any(|c| c == "PAID_UP_CAPITAL"));
}

#[test]
fn test_missing_snapshot_skips_without_touching_previous_log() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("log.csv");
    write(&log_path, "previous");

    let outcome = run_change_detection(
        &SnapshotDiffer::new(),
        &dir.path().join("old.csv"),
        &dir.path().join("new.csv"),
        &log_path,
        date(),
    )
    .unwrap();

    assert!(matches!(outcome, StageOutcome::Skipped { .. }));
    assert_eq!(fs::read_to_string(&log_path).unwrap(), "previous");
}
