//! Trailmap Storage - Disk-Resident Pipeline Artifacts
//!
//! Every intermediate of the pipeline lives on disk, never the whole dataset
//! in memory:
//!
//! ```text
//! source log ──► <user_data>/<user>.csv ──► <user_paths>/<user>_paths.csv ──► tables
//!              PartitionWriter            write_path_file                   write_table
//! ```
//!
//! Directory stages are checkpointed with completion markers; single-file
//! outputs are staged and renamed into place.

pub mod checkpoint;
pub mod codec;
pub mod naming;
pub mod partition_writer;
pub mod staged;
pub mod tables;

pub use checkpoint::{
    clear, inspect, is_stage_file, mark_complete, reset, CompletionRecord, DirState, MARKER_FILE,
};
pub use codec::{record_writer, write_record, HeaderLayout, RecordReader};
pub use naming::{list_user_files, FileKind, FileOwner, UserFile, MAX_STEM_BYTES};
pub use partition_writer::{PartitionStats, PartitionWriter};
pub use staged::{staged_target, StagedFile};
pub use tables::{
    read_path_file, read_table, write_path_file, write_table, PathFileContents, OWNER_TAG,
    TABLE_DELIMITER,
};
