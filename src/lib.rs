// Registry Insights - Core Library
// Pipeline stages, query surfaces and run history shared by the CLI,
// the dashboard and the API server

pub mod error;
pub mod config;
pub mod artifact;
pub mod record;         // Company rows + master dataset
pub mod merger;         // Stage 1: state files → master dataset
pub mod changelog;
pub mod differ;         // Stage 2: snapshots → change log
pub mod payload;
pub mod lookup;
pub mod enrichment;     // Stage 3: change log → enriched dataset
pub mod summary;        // Stage 4: change log → daily report
pub mod history;
pub mod query;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{PipelineError, PipelineResult};
pub use config::{LookupConfig, LookupMode, PipelineConfig};
pub use artifact::{file_digest, write_atomically, StageOutcome};
pub use record::{columns, normalize_column, CompanyRecord, MasterDataset};
pub use merger::{merge_state_dir, run_merge, MergeReport};
pub use changelog::{ChangeLog, ChangeLogEntry, ChangeType};
pub use differ::{run_change_detection, KeyPartition, SnapshotDiffer, ValueComparison};
pub use payload::{parse_new_value, Mapping, ParsedValue};
pub use lookup::{
    build_lookup, sector_for_nic, CompanyLookup, HeuristicLookup, LookupResult, RemoteLookup,
};
pub use enrichment::{
    load_enriched, run_enrichment, write_enriched, EnrichedRecord, EnrichmentEngine,
    ENRICHED_HEADER,
};
pub use summary::{generate_summary, SummaryCounts};
pub use history::{RunEvent, RunHistory, Stage};
pub use query::{answer, filter_options, DatasetHandle, FilterOptions, SearchQuery};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
