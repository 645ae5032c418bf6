//! Command-line interface for datawash.
//!
//! Provides commands for running the cleaning pipeline, profiling a dataset
//! and applying a procedure file.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
