//! Stage completion markers for directory-shaped stages.
//!
//! A stage writes [`MARKER_FILE`] into its output directory only after every
//! output file is flushed and closed. Marker present means complete; files
//! without a marker are the remains of an interrupted run and get cleared
//! before the stage recomputes.
//!
//! A stage only ever looks at or removes files it owns: per-user files of its
//! [`FileKind`], the marker, and staging files for either. Anything else in
//! the directory is left alone.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trailmap_core::{StorageError, TrailmapResult};

use crate::naming::FileKind;
use crate::staged::{staged_target, StagedFile};

/// Name of the completion marker inside a stage directory.
pub const MARKER_FILE: &str = ".trailmap-complete";

/// Contents of a completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Stage that produced the directory.
    pub stage: String,
    /// When the marker was written.
    pub completed_at: DateTime<Utc>,
    /// Stage-specific item count (records partitioned, paths extracted).
    pub items: u64,
    /// Per-user files written.
    pub files: u64,
}

/// What a stage directory currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirState {
    /// Missing, or holding no files of the stage.
    Empty,
    /// Holds stage files but no valid marker.
    Partial { entries: usize },
    /// Marker present and readable.
    Complete(CompletionRecord),
}

/// True when `name` belongs to a stage writing `kind` files.
pub fn is_stage_file(name: &str, kind: FileKind) -> bool {
    let name = staged_target(name).unwrap_or(name);
    name == MARKER_FILE || kind.parse_file_name(name).is_some()
}

/// Names of the stage files directly under `dir`. A missing directory has none.
fn stage_files(dir: &Path, kind: FileKind) -> TrailmapResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Read {
                path: dir.to_path_buf(),
                source,
            }
            .into())
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StorageError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.path().is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if is_stage_file(&name, kind) {
            names.push(name);
        } else {
            tracing::debug!(path = %entry.path().display(), "Ignoring foreign file in stage directory");
        }
    }
    Ok(names)
}

/// Inspect `dir` without modifying it.
pub fn inspect(dir: &Path, kind: FileKind) -> TrailmapResult<DirState> {
    let count = stage_files(dir, kind)?.len();
    if count == 0 {
        return Ok(DirState::Empty);
    }

    let marker = dir.join(MARKER_FILE);
    match fs::read_to_string(&marker) {
        Ok(contents) => match serde_json::from_str::<CompletionRecord>(&contents) {
            Ok(record) => Ok(DirState::Complete(record)),
            Err(err) => {
                tracing::warn!(path = %marker.display(), error = %err, "Ignoring unreadable completion marker");
                Ok(DirState::Partial { entries: count })
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Ok(DirState::Partial { entries: count })
        }
        Err(source) => Err(StorageError::Read {
            path: marker,
            source,
        }
        .into()),
    }
}

/// Remove every stage file under `dir`, returning how many were removed.
pub fn clear(dir: &Path, kind: FileKind) -> TrailmapResult<usize> {
    let names = stage_files(dir, kind)?;
    for name in &names {
        let path = dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(StorageError::Remove { path, source }.into()),
        }
    }
    Ok(names.len())
}

/// Ensure `dir` exists and holds no stage files.
pub fn reset(dir: &Path, kind: FileKind) -> TrailmapResult<()> {
    clear(dir, kind)?;
    fs::create_dir_all(dir).map_err(|source| {
        StorageError::CreateDir {
            path: dir.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Write the completion marker. Call only after all outputs are closed.
pub fn mark_complete(dir: &Path, stage: &str, items: u64, files: u64) -> TrailmapResult<()> {
    let record = CompletionRecord {
        stage: stage.to_string(),
        completed_at: Utc::now(),
        items,
        files,
    };
    let marker = dir.join(MARKER_FILE);
    let json = serde_json::to_string_pretty(&record).map_err(|err| StorageError::Codec {
        path: marker.clone(),
        reason: err.to_string(),
    })?;
    let mut staged = StagedFile::create(&marker)?;
    staged.write_all(json.as_bytes())?;
    staged.commit()
}

// ============================================================================
// TESTS
// ============================================================================
