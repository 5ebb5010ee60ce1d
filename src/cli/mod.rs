//! Command-line interface for article-forge.
//!
//! Provides the worker entry point plus small operator commands for
//! inspecting credential allocation and slugs.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
