//! Error types for the CLI.

use trailmap_core::TrailmapError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Trailmap(#[from] TrailmapError),
    #[error("Invalid argument --{arg}: {reason}")]
    InvalidArgument { arg: &'static str, reason: String },
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

pub type CliResult<T> = Result<T, CliError>;
