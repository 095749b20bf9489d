//! Trailmap Pipeline - Partition, Extract, Aggregate, Graph
//!
//! Turns a flat event log into statistics about the action paths users take
//! after a chosen trigger action:
//!
//! ```text
//! source log ─► partition ─► extract ─► aggregate ─► graph
//!               per user     paths      two tables   PlantUML
//! ```
//!
//! Every stage reads and writes disk artifacts and is skipped when its output
//! is already in place, so an interrupted run resumes where it stopped.

pub mod aggregate;
pub mod extract;
pub mod graph;
pub mod partition;
pub mod pipeline;
pub mod stage;

pub use aggregate::{
    aggregate_dir, run_aggregate, write_tables, AggregateStats, DetailRow, PathAggregate,
    PathTally, PositionAggregate, SummaryRow, DETAILED_HEADER, SUMMARY_HEADER,
};
pub use extract::{extract_all, extract_paths, run_extract, ExtractStats, PathScanner};
pub use graph::{paths_from_summary, run_graph, GraphStats, TransitionGraph};
pub use partition::{partition_source, run_partition};
pub use pipeline::{Pipeline, PipelineReport, RunOptions};
pub use stage::{Stage, StageOutcome};
