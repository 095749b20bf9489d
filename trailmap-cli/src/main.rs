//! Trailmap CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use trailmap_cli::cli::{execute, Cli};
use trailmap_cli::telemetry::init_tracing;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.log_json) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
