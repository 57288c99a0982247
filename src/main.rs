// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{warn, Level};

use registry_insights::{
    generate_summary, run_change_detection, run_enrichment, run_merge, EnrichmentEngine,
    LookupMode, MergeReport, PipelineConfig, RunEvent, RunHistory, SnapshotDiffer, Stage, StageOutcome,
    ValueComparison,
};

#[derive(Parser, Debug)]
#[command(
    name = "registry-insights",
    about = "Company registry pipeline: merge, diff, enrich, summarize",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pipeline configuration (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge per-state CSV files into the master dataset
    Merge,
    /// Compare two snapshots and write the change log
    Diff(DiffArgs),
    /// Enrich the newest change-log entries
    Enrich(EnrichArgs),
    /// Write the daily summary report
    Summary(DateArgs),
    /// Run all four stages in order
    Run(RunArgs),
    /// Show recent pipeline runs
    History(HistoryArgs),
    /// Interactive dashboard over the enriched dataset
    Dashboard,
}

#[derive(Args, Debug, Default)]
pub struct DateArgs {
    /// Report date (YYYY-MM-DD); today when omitted
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
pub struct DiffArgs {
    #[command(flatten)]
    pub date: DateArgs,

    /// Compare numeric-looking values as numbers
    #[arg(long)]
    pub numeric: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnrichArgs {
    /// Override the configured sample size
    #[arg(short = 'n', long)]
    pub sample_size: Option<usize>,

    /// Use the remote lookup service instead of the heuristic one
    #[arg(long)]
    pub remote: bool,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub diff: DiffArgs,

    #[command(flatten)]
    pub enrich: EnrichArgs,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = PipelineConfig::load(cli.config.as_deref())
        .context("Failed to load pipeline configuration")?;

    match cli.command {
        Command::Merge => run_merge_stage(&config),
        Command::Diff(args) => run_diff_stage(&config, &args).map(|_| ()),
        Command::Enrich(args) => run_enrich_stage(&config, &args).map(|_| ()),
        Command::Summary(args) => run_summary_stage(&config, &args),
        Command::Run(args) => run_all(&config, &args),
        Command::History(args) => show_history(&config, &args),
        Command::Dashboard => run_ui_mode(&config),
    }
}

fn report_date(args: &DateArgs) -> NaiveDate {
    args.date.unwrap_or_else(|| Local::now().date_naive())
}

/// Append a ledger entry; a ledger failure never fails the stage
fn record_run(config: &PipelineConfig, stage: Stage, artifact: &Path, records: usize) {
    let result = RunEvent::for_artifact(stage, artifact, records)
        .and_then(|event| RunHistory::open(&config.history_db)?.record(&event));

    if let Err(e) = result {
        warn!(stage = %stage, error = %e, "could not record run history");
    }
}

fn print_outcome(label: &str, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Published { path, records } => {
            println!("✓ {}: {} records → {}", label, records, path.display())
        }
        StageOutcome::Skipped { reason } => println!("⚠️  {} skipped: {}", label, reason),
    }
}

fn run_merge_stage(config: &PipelineConfig) -> Result<()> {
    println!("\n📂 Merging state files from {}...", config.state_data_dir.display());

    let report = run_merge(&config.state_data_dir, &config.master_output)
        .context("Merge stage failed")?;

    println!("{}", merge_summary(&report));
    for skipped in &report.files_skipped {
        println!("⚠️  Skipped {}", skipped);
    }
    println!("✓ Master dataset → {}", config.master_output.display());

    record_run(config, Stage::Merge, &config.master_output, report.total_records);
    Ok(())
}

fn merge_summary(report: &MergeReport) -> String {
    format!(
        "✓ Merged {}/{} files: {} records ({} duplicates dropped, {} rows without CIN)",
        report.files_merged.len(),
        report.files_found,
        report.total_records,
        report.duplicates_dropped,
        report.rows_without_cin
    )
}

fn run_diff_stage(config: &PipelineConfig, args: &DiffArgs) -> Result<StageOutcome> {
    println!("\n🔍 Detecting changes between snapshots...");

    let mut differ = SnapshotDiffer::from_config(config);
    if args.numeric {
        differ = differ.with_comparison(ValueComparison::Numeric);
    }

    let outcome = run_change_detection(
        &differ,
        &config.old_snapshot,
        &config.new_snapshot,
        &config.change_log,
        report_date(&args.date),
    )
    .context("Change detection failed")?;

    print_outcome("Change log", &outcome);
    if let StageOutcome::Published { path, records } = &outcome {
        record_run(config, Stage::ChangeDetection, path, *records);
    }
    Ok(outcome)
}

fn run_enrich_stage(config: &PipelineConfig, args: &EnrichArgs) -> Result<StageOutcome> {
    let mut config = config.clone();
    if let Some(n) = args.sample_size {
        config.sample_size = n;
    }
    if args.remote {
        config.lookup.mode = LookupMode::Remote;
    }
    config.validate().context("Invalid enrichment settings")?;

    let engine = EnrichmentEngine::from_config(&config).context("Failed to build lookup")?;
    println!(
        "\n✨ Enriching up to {} change-log entries ({} lookup)...",
        engine.sample_size(),
        engine.lookup_name()
    );

    let outcome = run_enrichment(&engine, &config.change_log, &config.enriched_output)
        .context("Enrichment failed")?;

    print_outcome("Enriched dataset", &outcome);
    if let StageOutcome::Published { path, records } = &outcome {
        record_run(&config, Stage::Enrichment, path, *records);
    }
    Ok(outcome)
}

fn run_summary_stage(config: &PipelineConfig, args: &DateArgs) -> Result<()> {
    let date = report_date(args);
    let counts = generate_summary(&config.change_log, &config.summary_output, date)
        .with_context(|| {
            format!(
                "Could not summarize {}; run change detection first",
                config.change_log.display()
            )
        })?;

    print!("{}", counts.render(date));
    println!("\n✓ Summary → {}", config.summary_output.display());

    record_run(config, Stage::Summary, &config.summary_output, counts.total);
    Ok(())
}

fn run_all(config: &PipelineConfig, args: &RunArgs) -> Result<()> {
    println!("🏢 Registry Insights - Full Pipeline");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    run_merge_stage(config)?;
    run_diff_stage(config, &args.diff)?;
    run_enrich_stage(config, &args.enrich)?;
    run_summary_stage(config, &args.diff.date)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Pipeline complete");
    Ok(())
}

fn show_history(config: &PipelineConfig, args: &HistoryArgs) -> Result<()> {
    let history = RunHistory::open(&config.history_db).context("Failed to open run history")?;
    let events = history.recent(args.limit)?;

    if events.is_empty() {
        println!("No pipeline runs recorded yet.");
        return Ok(());
    }

    println!(
        "{:<20} {:<17} {:>8}  {:<16} {}",
        "Timestamp", "Stage", "Records", "Digest", "Artifact"
    );
    for event in events {
        println!(
            "{:<20} {:<17} {:>8}  {:<16} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            event.stage.code(),
            event.records,
            event.digest.get(..16).unwrap_or(&event.digest),
            event.artifact
        );
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &PipelineConfig) -> Result<()> {
    use registry_insights::DatasetHandle;

    println!("🖥️  Loading Registry Insights dashboard...\n");

    let dataset = DatasetHandle::open(&config.enriched_output, &config.summary_output);
    if !dataset.is_loaded() {
        println!("⚠️  No data found. Run the enrichment stage first (press r to reload).");
    } else {
        println!("✓ Loaded {} company records", dataset.records().len());
    }

    let mut app = ui::App::new(dataset);
    ui::run_ui(&mut app)?;

    println!("\n✅ Dashboard closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &PipelineConfig) -> Result<()> {
    anyhow::bail!(
        "dashboard not available in this build; rebuild with --features tui \
         or run registry-server --features server"
    )
}
