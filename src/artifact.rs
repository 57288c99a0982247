// Artifact publishing
// Outputs are written to a sibling temp file and renamed into place, so
// readers only ever see a complete previous or complete new artifact.

use crate::error::PipelineResult;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Result of one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Artifact written (replacing any previous one)
    Published { path: PathBuf, records: usize },

    /// Stage returned early; previous artifact, if any, is untouched
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, StageOutcome::Published { .. })
    }

    pub fn records(&self) -> usize {
        match self {
            StageOutcome::Published { records, .. } => *records,
            StageOutcome::Skipped { .. } => 0,
        }
    }
}

/// Write an artifact through `write`, then atomically replace `path`.
///
/// On any error the temp file is dropped and `path` is left untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> PipelineResult<()>
where
    F: FnOnce(&mut dyn Write) -> PipelineResult<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// SHA-256 of a file's bytes, hex encoded
pub fn file_digest(path: &Path) -> PipelineResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
