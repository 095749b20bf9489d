//! Trailmap Core - Entity Types
//!
//! Pure data structures shared by every stage of the action-path pipeline:
//! the event record, the partition key, the action path, the error taxonomy
//! and the typed configuration. No stage logic lives here.

mod config;
mod entities;
mod error;
mod identity;

pub use config::{
    CsvConfig, DirectoriesConfig, OutputFilesConfig, PartitionConfig, TrailmapConfig,
    CONFIG_ENV_VAR,
};
pub use entities::{
    is_path_safe_action, ActionPath, EventRecord, PATH_SEPARATOR, RECORD_HEADER,
};
pub use error::{ConfigError, RecordError, StorageError, TrailmapError, TrailmapResult};
pub use identity::UserKey;
