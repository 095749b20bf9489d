//! Error types for trailmap operations

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors. Always fatal, raised before any stage runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or TRAILMAP_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config TOML {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Storage layer errors: a file or directory could not be created, opened,
/// read, written or renamed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {} into place: {source}", path.display())]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to clear {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Codec error on {}: {reason}", path.display())]
    Codec { path: PathBuf, reason: String },
}

/// A source or intermediate row that does not fit the expected schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Malformed record at line {line}: missing {field}")]
    MissingField { line: u64, field: &'static str },

    #[error("Malformed header: missing column {column}")]
    MissingColumn { column: &'static str },

    #[error("Malformed record at line {line}: {reason}")]
    Unparseable { line: u64, reason: String },
}

/// Master error type for all trailmap errors.
#[derive(Debug, Error)]
pub enum TrailmapError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

/// Result type alias for trailmap operations.
pub type TrailmapResult<T> = Result<T, TrailmapError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "csv.delimiter".to_string(),
            value: ";;".to_string(),
            reason: "must be a single byte".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("csv.delimiter"));
        assert!(msg.contains(";;"));
        assert!(msg.contains("single byte"));
    }

    #[test]
    fn test_storage_error_display_includes_path() {
        let err = StorageError::Open {
            path: PathBuf::from("user_data/user1.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("user_data/user1.csv"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_record_error_display_missing_field() {
        let err = RecordError::MissingField {
            line: 7,
            field: "User",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("line 7"));
        assert!(msg.contains("User"));
    }

    #[test]
    fn test_trailmap_error_from_variants() {
        let config = TrailmapError::from(ConfigError::MissingConfigPath);
        assert!(matches!(config, TrailmapError::Config(_)));

        let storage = TrailmapError::from(StorageError::Codec {
            path: PathBuf::from("x"),
            reason: "bad".to_string(),
        });
        assert!(matches!(storage, TrailmapError::Storage(_)));

        let record = TrailmapError::from(RecordError::MissingColumn { column: "Action" });
        assert!(matches!(record, TrailmapError::Record(_)));
    }
}
