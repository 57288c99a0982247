// Pipeline error types
// Library code returns PipelineResult; the binaries wrap it in anyhow.

use std::path::PathBuf;

/// Errors raised by the pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required input artifact does not exist.
    #[error("input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// The merger found no state file it could use.
    #[error("no usable state files in {}", .0.display())]
    NoSourceFiles(PathBuf),

    /// A tabular file lacks a column the stage cannot work without.
    #[error("missing column {column} in {}", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run history store failure.
    #[error("history store error: {0}")]
    History(#[from] rusqlite::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
