//! Stage identity and status logging shared by every pipeline step.

use std::fmt;
use std::path::Path;

use trailmap_storage::CompletionRecord;

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Partition,
    Extract,
    Aggregate,
    Graph,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Partition,
        Stage::Extract,
        Stage::Aggregate,
        Stage::Graph,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Partition => "partition",
            Stage::Extract => "extract",
            Stage::Aggregate => "aggregate",
            Stage::Graph => "graph",
        }
    }

    pub(crate) fn started(self) {
        tracing::info!(stage = self.name(), "Stage started");
    }

    /// Log a skip caused by a completion marker.
    pub(crate) fn skipped<T>(self, record: &CompletionRecord) -> StageOutcome<T> {
        tracing::info!(
            stage = self.name(),
            completed_at = %record.completed_at,
            items = record.items,
            files = record.files,
            "Output already complete, skipping stage"
        );
        StageOutcome::Skipped
    }

    /// Log a skip caused by existing output files.
    pub(crate) fn skipped_existing<T>(self, outputs: &[&Path]) -> StageOutcome<T> {
        let outputs: Vec<String> = outputs.iter().map(|p| p.display().to_string()).collect();
        tracing::info!(
            stage = self.name(),
            outputs = ?outputs,
            "Output already exists, skipping stage"
        );
        StageOutcome::Skipped
    }

    pub(crate) fn clearing_partial(self, dir: &Path, entries: usize) {
        tracing::warn!(
            stage = self.name(),
            dir = %dir.display(),
            entries,
            "Found output without completion marker, clearing and recomputing"
        );
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a stage did work or found its output already in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    Ran(T),
    Skipped,
}

impl<T> StageOutcome<T> {
    pub fn ran(&self) -> Option<&T> {
        match self {
            StageOutcome::Ran(value) => Some(value),
            StageOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped)
    }

    pub fn into_ran(self) -> Option<T> {
        match self {
            StageOutcome::Ran(value) => Some(value),
            StageOutcome::Skipped => None,
        }
    }
}
