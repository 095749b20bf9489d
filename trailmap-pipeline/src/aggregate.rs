//! Aggregation of extracted paths across every user.
//!
//! Two passes. The first tallies each distinct canonical path: occurrences
//! count every emission, users count distinct contributors. The second
//! decomposes each distinct path into `(position, action)` pairs and folds the
//! path's tally into every pair it touches. Position statistics therefore
//! derive from the aggregated paths, never from the per-user files.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use indexmap::IndexMap;
use trailmap_core::{ActionPath, TrailmapConfig, TrailmapError, TrailmapResult, UserKey};
use trailmap_storage::{
    list_user_files, read_path_file, write_table, FileKind, FileOwner, UserFile,
};

use crate::stage::{Stage, StageOutcome};

pub const SUMMARY_HEADER: [&str; 3] = ["Path", "Occurrences", "Users"];
pub const DETAILED_HEADER: [&str; 4] = ["Sequence", "Action", "Occurrences", "Users"];

// ============================================================================
// TALLIES
// ============================================================================

/// Occurrences plus the set of contributing users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTally {
    pub occurrences: u64,
    pub users: HashSet<UserKey>,
}

impl PathTally {
    pub fn distinct_users(&self) -> u64 {
        self.users.len() as u64
    }

    fn absorb(&mut self, other: &PathTally) {
        self.occurrences += other.occurrences;
        self.users.extend(other.users.iter().cloned());
    }
}

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub path: ActionPath,
    pub occurrences: u64,
    pub users: u64,
}

impl SummaryRow {
    fn fields(&self) -> [String; 3] {
        [
            self.path.canonical(),
            self.occurrences.to_string(),
            self.users.to_string(),
        ]
    }
}

/// One row of the detailed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow {
    pub position: usize,
    pub action: String,
    pub occurrences: u64,
    pub users: u64,
}

impl DetailRow {
    fn fields(&self) -> [String; 4] {
        [
            self.position.to_string(),
            self.action.clone(),
            self.occurrences.to_string(),
            self.users.to_string(),
        ]
    }
}

/// Distinct paths in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PathAggregate {
    paths: IndexMap<ActionPath, PathTally>,
}

impl PathAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one emission of `path` by `user`.
    pub fn record(&mut self, path: ActionPath, user: &UserKey) {
        let tally = self.paths.entry(path).or_default();
        tally.occurrences += 1;
        if !tally.users.contains(user) {
            tally.users.insert(user.clone());
        }
    }

    /// Fold another aggregate in. Paths new to `self` keep `other`'s order
    /// after all of `self`'s.
    pub fn merge(&mut self, other: PathAggregate) {
        for (path, tally) in other.paths {
            self.paths.entry(path).or_default().absorb(&tally);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, path: &ActionPath) -> Option<&PathTally> {
        self.paths.get(path)
    }

    /// Distinct paths in first-seen order.
    pub fn paths(&self) -> impl Iterator<Item = &ActionPath> {
        self.paths.keys()
    }

    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        self.paths
            .iter()
            .map(|(path, tally)| SummaryRow {
                path: path.clone(),
                occurrences: tally.occurrences,
                users: tally.distinct_users(),
            })
            .collect()
    }

    /// Second pass: per-position statistics from the distinct paths.
    pub fn positions(&self) -> PositionAggregate {
        let mut positions = PositionAggregate::default();
        for (path, tally) in &self.paths {
            for (position, action) in path.positions() {
                positions
                    .pairs
                    .entry((position, action.to_string()))
                    .or_default()
                    .absorb(tally);
            }
        }
        positions
    }
}

/// Per `(position, action)` tallies, ordered by position then action.
#[derive(Debug, Clone, Default)]
pub struct PositionAggregate {
    pairs: BTreeMap<(usize, String), PathTally>,
}

impl PositionAggregate {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, position: usize, action: &str) -> Option<&PathTally> {
        self.pairs.get(&(position, action.to_string()))
    }

    pub fn detail_rows(&self) -> Vec<DetailRow> {
        self.pairs
            .iter()
            .map(|((position, action), tally)| DetailRow {
                position: *position,
                action: action.clone(),
                occurrences: tally.occurrences,
                users: tally.distinct_users(),
            })
            .collect()
    }
}

// ============================================================================
// STAGE
// ============================================================================

/// Counters for one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub path_files: u64,
    pub lines: u64,
    pub skipped_lines: u64,
    pub distinct_paths: u64,
    pub position_rows: u64,
}

/// Scan every path file under `dir` in file-name order.
pub fn aggregate_dir(dir: &Path) -> TrailmapResult<(PathAggregate, AggregateStats)> {
    let mut aggregate = PathAggregate::new();
    let mut stats = AggregateStats::default();

    for UserFile { owner, path, .. } in list_user_files(dir, FileKind::Paths)? {
        let contents = match read_path_file(&path) {
            Ok(contents) => contents,
            Err(TrailmapError::Storage(err)) => {
                tracing::warn!(path = %path.display(), error = %err, "Path file unreadable, skipping");
                continue;
            }
            Err(err) => return Err(err),
        };
        let user = match (owner, contents.owner) {
            (FileOwner::Named(user), _) => user,
            (FileOwner::Digest, Some(user)) => user,
            (FileOwner::Digest, None) => {
                if !contents.lines.is_empty() {
                    tracing::warn!(path = %path.display(), "Path file has no owner row, skipping");
                    stats.skipped_lines += contents.lines.len() as u64;
                }
                continue;
            }
        };
        stats.path_files += 1;
        stats.skipped_lines += contents.malformed;

        for line in contents.lines {
            match ActionPath::parse(&line) {
                Some(action_path) => {
                    aggregate.record(action_path, &user);
                    stats.lines += 1;
                }
                None => {
                    tracing::warn!(path = %path.display(), line = %line, "Skipping malformed path line");
                    stats.skipped_lines += 1;
                }
            }
        }
    }

    stats.distinct_paths = aggregate.len() as u64;
    Ok((aggregate, stats))
}

/// Write both tables for `aggregate`.
pub fn write_tables(
    aggregate: &PathAggregate,
    summary: &Path,
    detailed: &Path,
) -> TrailmapResult<u64> {
    write_table(
        summary,
        &SUMMARY_HEADER,
        aggregate.summary_rows().iter().map(SummaryRow::fields),
    )?;
    let detail = aggregate.positions().detail_rows();
    write_table(detailed, &DETAILED_HEADER, detail.iter().map(DetailRow::fields))?;
    Ok(detail.len() as u64)
}

/// Run aggregation. Skipped when both tables already exist.
pub fn run_aggregate(
    config: &TrailmapConfig,
) -> TrailmapResult<StageOutcome<(PathAggregate, AggregateStats)>> {
    let summary = &config.output_files.summary;
    let detailed = &config.output_files.detailed;
    if summary.exists() && detailed.exists() {
        return Ok(Stage::Aggregate.skipped_existing(&[summary.as_path(), detailed.as_path()]));
    }

    Stage::Aggregate.started();
    let (aggregate, mut stats) = aggregate_dir(&config.directories.user_paths)?;
    stats.position_rows = write_tables(&aggregate, summary, detailed)?;
    tracing::info!(
        stage = Stage::Aggregate.name(),
        path_files = stats.path_files,
        distinct_paths = stats.distinct_paths,
        position_rows = stats.position_rows,
        skipped_lines = stats.skipped_lines,
        "Aggregation complete"
    );
    Ok(StageOutcome::Ran((aggregate, stats)))
}

// ============================================================================
// TESTS
// ============================================================================
