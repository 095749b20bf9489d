//! End-to-end orchestration of the four stages.

use std::fs;
use std::path::Path;

use trailmap_core::{StorageError, TrailmapConfig, TrailmapResult};
use trailmap_storage::{checkpoint, FileKind, PartitionStats};

use crate::aggregate::{run_aggregate, AggregateStats};
use crate::extract::{run_extract, ExtractStats};
use crate::graph::{run_graph, GraphStats};
use crate::partition::run_partition;
use crate::stage::StageOutcome;

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Remove every output before running so nothing is skipped.
    pub fresh: bool,
}

/// What each stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub partition: StageOutcome<PartitionStats>,
    pub extract: StageOutcome<ExtractStats>,
    pub aggregate: StageOutcome<AggregateStats>,
    pub graph: StageOutcome<GraphStats>,
}

impl PipelineReport {
    pub fn stages_run(&self) -> usize {
        [
            !self.partition.is_skipped(),
            !self.extract.is_skipped(),
            !self.aggregate.is_skipped(),
            !self.graph.is_skipped(),
        ]
        .iter()
        .filter(|ran| **ran)
        .count()
    }
}

/// The configured pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: TrailmapConfig,
}

impl Pipeline {
    pub fn new(config: TrailmapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrailmapConfig {
        &self.config
    }

    /// Validate the configuration, then run every stage in order, stopping at
    /// the first error.
    pub fn run(&self, options: RunOptions) -> TrailmapResult<PipelineReport> {
        self.config.validate()?;
        if options.fresh {
            self.clean()?;
        }
        tracing::info!(
            input = %self.config.input_file.display(),
            target_action = %self.config.target_action,
            fresh = options.fresh,
            "Pipeline starting"
        );

        let partition = run_partition(&self.config)?;
        let extract = run_extract(&self.config)?;
        let (aggregate, aggregated) = match run_aggregate(&self.config)? {
            StageOutcome::Ran((aggregate, stats)) => (StageOutcome::Ran(stats), Some(aggregate)),
            StageOutcome::Skipped => (StageOutcome::Skipped, None),
        };
        let graph = run_graph(&self.config, aggregated.as_ref())?;

        let report = PipelineReport {
            partition,
            extract,
            aggregate,
            graph,
        };
        tracing::info!(stages_run = report.stages_run(), "Pipeline finished");
        Ok(report)
    }

    /// Remove every stage output. Files the stages did not write stay put.
    pub fn clean(&self) -> TrailmapResult<()> {
        checkpoint::clear(&self.config.directories.user_data, FileKind::Partition)?;
        checkpoint::clear(&self.config.directories.user_paths, FileKind::Paths)?;
        remove_file(&self.config.output_files.summary)?;
        remove_file(&self.config.output_files.detailed)?;
        remove_file(&self.config.output_files.plantuml)?;
        tracing::debug!("Removed previous outputs");
        Ok(())
    }
}

fn remove_file(file: &Path) -> TrailmapResult<()> {
    match fs::remove_file(file) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StorageError::Remove {
            path: file.to_path_buf(),
            source,
        }
        .into()),
    }
}
