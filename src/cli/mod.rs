//! Command-line interface for stream-eval.
//!
//! Provides the `evaluate` and `gateway` commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
