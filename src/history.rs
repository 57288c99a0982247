// 🧾 Run History - Every published artifact is an event
// SQLite ledger (WAL mode) of pipeline stage runs with artifact digests.

use crate::artifact::file_digest;
use crate::error::PipelineResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Merge,
    ChangeDetection,
    Enrichment,
    Summary,
}

impl Stage {
    pub fn code(&self) -> &'static str {
        match self {
            Stage::Merge => "merge",
            Stage::ChangeDetection => "change_detection",
            Stage::Enrichment => "enrichment",
            Stage::Summary => "summary",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "merge" => Some(Stage::Merge),
            "change_detection" => Some(Stage::ChangeDetection),
            "enrichment" => Some(Stage::Enrichment),
            "summary" => Some(Stage::Summary),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One published artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub stage: Stage,
    pub artifact: String,
    pub records: i64,
    /// SHA-256 of the artifact bytes
    pub digest: String,
}

impl RunEvent {
    /// Event for an artifact already on disk
    pub fn for_artifact(stage: Stage, artifact: &Path, records: usize) -> PipelineResult<Self> {
        Ok(RunEvent {
            run_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            stage,
            artifact: artifact.display().to_string(),
            records: records as i64,
            digest: file_digest(artifact)?,
        })
    }
}

pub struct RunHistory {
    conn: Connection,
}

impl RunHistory {
    /// Open (creating if needed) the ledger at `path`
    pub fn open(path: &Path) -> PipelineResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> PipelineResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> PipelineResult<Self> {
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT UNIQUE NOT NULL,
                timestamp TEXT NOT NULL,
                stage TEXT NOT NULL,
                artifact TEXT NOT NULL,
                records INTEGER NOT NULL,
                digest TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_runs_stage ON runs(stage, timestamp)",
            [],
        )?;

        Ok(RunHistory { conn })
    }

    pub fn record(&self, event: &RunEvent) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO runs (run_id, timestamp, stage, artifact, records, digest)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.run_id,
                event.timestamp.to_rfc3339(),
                event.stage.code(),
                event.artifact,
                event.records,
                event.digest,
            ],
        )?;
        Ok(())
    }

    /// Most recent runs first
    pub fn recent(&self, limit: usize) -> PipelineResult<Vec<RunEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, timestamp, stage, artifact, records, digest
             FROM runs
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let events = stmt
            .query_map(params![limit as i64], |row| {
                let timestamp_str: String = row.get(1)?;
                let stage_str: String = row.get(2)?;

                Ok(RunEvent {
                    run_id: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                1,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?
                        .with_timezone(&Utc),
                    stage: Stage::from_code(&stage_str).ok_or(rusqlite::Error::InvalidQuery)?,
                    artifact: row.get(3)?,
                    records: row.get(4)?,
                    digest: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Digest of the latest run of `stage`, if any
    pub fn last_digest(&self, stage: Stage) -> PipelineResult<Option<String>> {
        let digest = self
            .conn
            .query_row(
                "SELECT digest FROM runs WHERE stage = ?1 ORDER BY id DESC LIMIT 1",
                params![stage.code()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(digest)
    }

    pub fn count(&self) -> PipelineResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count)
    }
}
