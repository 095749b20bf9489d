//! Partitioning: stream the source log into one spill file per user.
//!
//! Each record is appended to its user's partition in source order. The stage
//! aborts on the first malformed row; the output directory is then left
//! without a completion marker and is cleared on the next run.

use std::path::Path;

use trailmap_core::{TrailmapConfig, TrailmapResult};
use trailmap_storage::{
    checkpoint, DirState, FileKind, PartitionStats, PartitionWriter, RecordReader,
};

use crate::stage::{Stage, StageOutcome};

/// Stream `input` into per-user files under `out_dir`.
///
/// `out_dir` is expected to be empty; records are appended to whatever
/// partitions already exist there.
pub fn partition_source(
    input: &Path,
    out_dir: &Path,
    delimiter: u8,
    max_open_files: usize,
) -> TrailmapResult<PartitionStats> {
    let reader = RecordReader::open(input, delimiter)?;
    let mut writer = PartitionWriter::new(out_dir, delimiter, max_open_files)?;
    for record in reader {
        writer.append(&record?)?;
    }
    writer.finish()
}

/// Run partitioning with checkpoint semantics.
pub fn run_partition(config: &TrailmapConfig) -> TrailmapResult<StageOutcome<PartitionStats>> {
    let out_dir = &config.directories.user_data;
    match checkpoint::inspect(out_dir, FileKind::Partition)? {
        DirState::Complete(record) => return Ok(Stage::Partition.skipped(&record)),
        DirState::Partial { entries } => Stage::Partition.clearing_partial(out_dir, entries),
        DirState::Empty => {}
    }
    checkpoint::reset(out_dir, FileKind::Partition)?;

    Stage::Partition.started();
    let stats = partition_source(
        &config.input_file,
        out_dir,
        config.delimiter(),
        config.partition.max_open_files,
    )?;
    checkpoint::mark_complete(
        out_dir,
        Stage::Partition.name(),
        stats.records,
        stats.partitions_created,
    )?;
    tracing::info!(
        stage = Stage::Partition.name(),
        records = stats.records,
        partitions = stats.partitions_created,
        evictions = stats.evictions,
        "Partitioning complete"
    );
    Ok(StageOutcome::Ran(stats))
}

// ============================================================================
// TESTS
// ============================================================================
