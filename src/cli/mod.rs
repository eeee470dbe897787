//! Command line interface for the `burn` tool.
//!
//! Argument parsing, command dispatch, and colored terminal output live
//! here; the container and inscribe logic stays in the library modules.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RuntimeConfig};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point.
pub fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args)
}
