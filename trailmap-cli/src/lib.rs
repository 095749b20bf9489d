//! Trailmap CLI library exports.

pub mod cli;
pub mod error;
pub mod generate;
pub mod telemetry;
