//! Command-line definitions and dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use trailmap_core::{TrailmapConfig, TrailmapError};
use trailmap_pipeline::{Pipeline, PipelineReport, RunOptions, StageOutcome};

use crate::error::{CliError, CliResult};
use crate::generate::{generate, GeneratorSettings};

// ============================================================================
// CLI TYPES
// ============================================================================

/// Trailmap - frequent action paths from event logs
#[derive(Parser, Debug)]
#[command(name = "trailmap", version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: partition, extract, aggregate, graph
    Run {
        /// Path to the TOML configuration file [default: $TRAILMAP_CONFIG]
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Event log to ingest (overrides `input_file`)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Remove all previous outputs first
        #[arg(long)]
        fresh: bool,
    },

    /// Write a random event log for trying the pipeline
    Generate {
        /// Number of rows to generate
        #[arg(long, default_value_t = 100)]
        rows: u64,

        /// Output file
        #[arg(short, long, default_value = "actions.csv")]
        output: PathBuf,

        /// Number of distinct users (user1..userN)
        #[arg(long, default_value_t = 5)]
        users: u32,

        /// Action alphabet
        #[arg(long, value_delimiter = ',', default_value = "A,B,C,D,E")]
        actions: Vec<String>,

        /// Field delimiter
        #[arg(long, default_value_t = ';')]
        delimiter: char,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

// ============================================================================
// DISPATCH
// ============================================================================

pub fn execute(command: Commands) -> CliResult<()> {
    match command {
        Commands::Run {
            config,
            input,
            fresh,
        } => {
            let mut config = TrailmapConfig::load(config.as_deref()).map_err(TrailmapError::from)?;
            if let Some(input) = input {
                config.input_file = input;
            }
            let report = Pipeline::new(config).run(RunOptions { fresh })?;
            log_report(&report);
            Ok(())
        }
        Commands::Generate {
            rows,
            output,
            users,
            actions,
            delimiter,
            seed,
        } => {
            let delimiter = delimiter_byte(delimiter)?;
            let settings = GeneratorSettings {
                output,
                rows,
                users,
                actions,
                delimiter,
                seed,
                anchor: chrono::Local::now().naive_local(),
            };
            generate(&settings)?;
            Ok(())
        }
    }
}

fn delimiter_byte(delimiter: char) -> CliResult<u8> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(CliError::InvalidArgument {
            arg: "delimiter",
            reason: format!("{:?} is not a single ASCII character", delimiter),
        })
    }
}

fn log_report(report: &PipelineReport) {
    fn status<T>(outcome: &StageOutcome<T>) -> &'static str {
        match outcome {
            StageOutcome::Ran(_) => "ran",
            StageOutcome::Skipped => "skipped",
        }
    }
    tracing::info!(
        partition = status(&report.partition),
        extract = status(&report.extract),
        aggregate = status(&report.aggregate),
        graph = status(&report.graph),
        "Run summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "trailmap", "run", "--config", "t.toml", "--input", "in.csv", "--fresh", "--log-json",
        ])
        .expect("parse");
        assert!(cli.log_json);
        match cli.command {
            Commands::Run {
                config,
                input,
                fresh,
            } => {
                assert_eq!(config, Some(PathBuf::from("t.toml")));
                assert_eq!(input, Some(PathBuf::from("in.csv")));
                assert!(fresh);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_generate_defaults() {
        let cli = Cli::try_parse_from(["trailmap", "generate", "--seed", "3"]).expect("parse");
        match cli.command {
            Commands::Generate {
                rows,
                output,
                users,
                actions,
                delimiter,
                seed,
            } => {
                assert_eq!(rows, 100);
                assert_eq!(output, PathBuf::from("actions.csv"));
                assert_eq!(users, 5);
                assert_eq!(actions, vec!["A", "B", "C", "D", "E"]);
                assert_eq!(delimiter, ';');
                assert_eq!(seed, Some(3));
            }
            other => panic!("expected generate, got {:?}", other),
        }
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        assert!(delimiter_byte('§').is_err());
        assert_eq!(delimiter_byte(',').expect("ascii"), b',');
    }
}
