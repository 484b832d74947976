//! CLI module
//!
//! Command-line interface for running connectors.
//!
//! # Commands
//!
//! - `read` - Extract data from streams, checkpointing cursor state
//! - `validate` - Validate a connector definition
//! - `streams` - List stream names

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
