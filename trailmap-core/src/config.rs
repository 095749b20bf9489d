//! Configuration types
//!
//! All fields are required. The document is parsed once, validated once and
//! then handed to each stage by reference.

use crate::{is_path_safe_action, ConfigError, PATH_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Environment variable consulted when no `--config` path is given.
pub const CONFIG_ENV_VAR: &str = "TRAILMAP_CONFIG";

/// Delimited-file settings for the source log and partition files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvConfig {
    pub delimiter: String,
}

/// Working directories for the two directory-shaped stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoriesConfig {
    /// Per-user partition files.
    pub user_data: PathBuf,
    /// Per-user path files.
    pub user_paths: PathBuf,
}

/// Final artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputFilesConfig {
    /// Path-level table: `Path,Occurrences,Users`.
    pub summary: PathBuf,
    /// Position-level table: `Sequence,Action,Occurrences,Users`.
    pub detailed: PathBuf,
    /// Transition graph description.
    pub plantuml: PathBuf,
}

/// Partitioner resource bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionConfig {
    /// Maximum spill files held open at once.
    pub max_open_files: usize,
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrailmapConfig {
    /// Action that opens a new path.
    pub target_action: String,
    /// Event log to ingest.
    pub input_file: PathBuf,
    pub csv: CsvConfig,
    pub directories: DirectoriesConfig,
    pub output_files: OutputFilesConfig,
    pub partition: PartitionConfig,
}

impl TrailmapConfig {
    /// Locate, read, parse and validate the configuration.
    ///
    /// `explicit` wins over [`CONFIG_ENV_VAR`].
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(config_path_from_env)
            .ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse without validating.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The delimiter as a single byte. Only meaningful after [`Self::validate`].
    pub fn delimiter(&self) -> u8 {
        self.csv.delimiter.as_bytes().first().copied().unwrap_or(b';')
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - target_action is non-empty and does not contain the path separator
    /// - csv.delimiter is exactly one ASCII byte, not a quote or line break
    /// - both working directories are set and neither contains the other
    /// - all three output files are set and distinct
    /// - input_file and the output files sit outside both working directories
    /// - partition.max_open_files >= 1
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_action.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "target_action".to_string(),
            });
        }
        if !is_path_safe_action(&self.target_action) {
            return Err(ConfigError::InvalidValue {
                field: "target_action".to_string(),
                value: self.target_action.clone(),
                reason: format!("must not contain the path separator '{}'", PATH_SEPARATOR),
            });
        }

        if self.input_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "input_file".to_string(),
            });
        }

        let delimiter = self.csv.delimiter.as_bytes();
        if delimiter.len() != 1 || !delimiter[0].is_ascii() {
            return Err(ConfigError::InvalidValue {
                field: "csv.delimiter".to_string(),
                value: self.csv.delimiter.clone(),
                reason: "must be exactly one ASCII character".to_string(),
            });
        }
        if matches!(delimiter[0], b'"' | b'\n' | b'\r') {
            return Err(ConfigError::InvalidValue {
                field: "csv.delimiter".to_string(),
                value: self.csv.delimiter.escape_default().to_string(),
                reason: "must not be a quote or line break".to_string(),
            });
        }

        require_path("directories.user_data", &self.directories.user_data)?;
        require_path("directories.user_paths", &self.directories.user_paths)?;
        let user_data = lexical(&self.directories.user_data);
        let user_paths = lexical(&self.directories.user_paths);
        if user_data.starts_with(&user_paths) || user_paths.starts_with(&user_data) {
            return Err(ConfigError::InvalidValue {
                field: "directories.user_paths".to_string(),
                value: self.directories.user_paths.display().to_string(),
                reason: "must be separate from directories.user_data, not nested in it"
                    .to_string(),
            });
        }

        require_path("output_files.summary", &self.output_files.summary)?;
        require_path("output_files.detailed", &self.output_files.detailed)?;
        require_path("output_files.plantuml", &self.output_files.plantuml)?;
        let outputs = [
            &self.output_files.summary,
            &self.output_files.detailed,
            &self.output_files.plantuml,
        ];
        for (idx, a) in outputs.iter().enumerate() {
            if outputs[idx + 1..].contains(a) {
                return Err(ConfigError::InvalidValue {
                    field: "output_files".to_string(),
                    value: a.display().to_string(),
                    reason: "output files must be distinct".to_string(),
                });
            }
        }

        // stage directories are cleared on rerun
        let files = [
            ("input_file", &self.input_file),
            ("output_files.summary", &self.output_files.summary),
            ("output_files.detailed", &self.output_files.detailed),
            ("output_files.plantuml", &self.output_files.plantuml),
        ];
        for (field, file) in files {
            let file_lexical = lexical(file);
            for (dir_field, dir) in [
                ("directories.user_data", &user_data),
                ("directories.user_paths", &user_paths),
            ] {
                if file_lexical.starts_with(dir) {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_string(),
                        value: file.display().to_string(),
                        reason: format!("must not be inside {}", dir_field),
                    });
                }
            }
        }

        if self.partition.max_open_files == 0 {
            return Err(ConfigError::InvalidValue {
                field: "partition.max_open_files".to_string(),
                value: "0".to_string(),
                reason: "must be >= 1".to_string(),
            });
        }

        Ok(())
    }
}

fn require_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::MissingRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// `path` with `.` components dropped, for containment checks.
fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
target_action = "A"
input_file = "actions.csv"

[csv]
delimiter = ";"

[directories]
user_data = "user_data"
user_paths = "user_paths"

[output_files]
summary = "paths_summary.csv"
detailed = "paths_detailed.csv"
plantuml = "paths.puml"

[partition]
max_open_files = 64
"#;

    fn sample() -> TrailmapConfig {
        toml::from_str(SAMPLE).expect("sample config should parse")
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.delimiter(), b';');
        assert_eq!(config.target_action, "A");
        assert_eq!(config.partition.max_open_files, 64);
    }

    #[test]
    fn test_shipped_example_is_valid() {
        let config: TrailmapConfig =
            toml::from_str(include_str!("../../trailmap.example.toml")).expect("example parses");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_path_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE.as_bytes()).expect("write");
        let config = TrailmapConfig::from_path(file.path()).expect("load");
        assert_eq!(config, sample());
    }

    #[test]
    fn test_load_explicit_path_validates() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE.replace("max_open_files = 64", "max_open_files = 0").as_bytes())
            .expect("write");
        let err = TrailmapConfig::load(Some(file.path())).expect_err("should fail validation");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "partition.max_open_files"));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = TrailmapConfig::from_path(Path::new("/nonexistent/trailmap.toml"))
            .expect_err("missing file should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(format!("{}\nextra = 1\n", SAMPLE).as_bytes())
            .expect("write");
        let err = TrailmapConfig::from_path(file.path()).expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_rejects_multi_byte_delimiter() {
        let mut config = sample();
        config.csv.delimiter = ";;".to_string();
        let err = config.validate().expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "csv.delimiter"));
    }

    #[test]
    fn test_rejects_quote_delimiter() {
        let mut config = sample();
        config.csv.delimiter = "\"".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_target_action() {
        let mut config = sample();
        config.target_action = "  ".to_string();
        let err = config.validate().expect_err("should fail");
        assert!(matches!(err, ConfigError::MissingRequired { ref field } if field == "target_action"));
    }

    #[test]
    fn test_rejects_target_action_with_separator() {
        let mut config = sample();
        config.target_action = "A->B".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_shared_working_directory() {
        let mut config = sample();
        config.directories.user_paths = config.directories.user_data.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_nested_working_directories() {
        let mut config = sample();
        config.directories.user_paths = PathBuf::from("./user_data/paths");
        let err = config.validate().expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "directories.user_paths"));

        let mut config = sample();
        config.directories.user_data = PathBuf::from("user_paths/data");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_input_inside_working_directory() {
        let mut config = sample();
        config.directories.user_data = PathBuf::from("data");
        config.input_file = PathBuf::from("./data/actions.csv");
        let err = config.validate().expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "input_file"));
    }

    #[test]
    fn test_rejects_output_inside_working_directory() {
        let mut config = sample();
        config.output_files.detailed = PathBuf::from("user_paths/detailed.csv");
        let err = config.validate().expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "output_files.detailed"));
    }

    #[test]
    fn test_sibling_names_are_not_nested() {
        let mut config = sample();
        config.input_file = PathBuf::from("user_data.csv");
        config.output_files.summary = PathBuf::from("user_paths_summary.csv");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_output_files() {
        let mut config = sample();
        config.output_files.plantuml = config.output_files.summary.clone();
        let err = config.validate().expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "output_files"));
    }
}
