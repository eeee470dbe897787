//! Command line argument parsing and validation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bundle container tool: inspect, detach, and reattach Burn bundles
#[derive(Parser, Debug)]
#[command(
    name = "burn",
    version,
    about = "Inspect, detach, and reattach Burn bundle containers",
    long_about = "Work with Burn bundle executables.

Usage:
  burn detach input.exe --engine engine.exe
  burn reattach input.exe --engine signed.exe --out final.exe
  burn extract input.exe --out extracted/
  burn remote-payload payload.dll --out report.json"
)]
pub struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// The operations the tool exposes.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy the unsigned engine out of a bundle for external signing
    Detach {
        /// Bundle executable to read
        input: PathBuf,
        /// Where to write the detached engine
        #[arg(long)]
        engine: PathBuf,
        /// Folder for temporary files (defaults to a scratch directory)
        #[arg(long)]
        intermediate_folder: Option<PathBuf>,
    },
    /// Merge a signed engine back with the original bundle's attached container
    Reattach {
        /// Original bundle the engine was detached from
        input: PathBuf,
        /// Externally signed engine file
        #[arg(long)]
        engine: PathBuf,
        /// Where to write the final bundle (defaults to overwriting the input)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Folder for temporary files (defaults to a scratch directory)
        #[arg(long)]
        intermediate_folder: Option<PathBuf>,
    },
    /// Extract the UX container (and attached containers, best effort)
    Extract {
        /// Bundle executable to read
        input: PathBuf,
        /// Folder to extract into
        #[arg(short, long)]
        out: PathBuf,
        /// Folder for temporary files (defaults to a scratch directory)
        #[arg(long)]
        intermediate_folder: Option<PathBuf>,
    },
    /// Harvest payload metadata and Authenticode trust data from files
    RemotePayload {
        /// Payload files to harvest
        files: Vec<PathBuf>,
        /// Where to write the JSON report (defaults to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

impl Command {
    /// Subcommand name for messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Detach { .. } => "detach",
            Command::Reattach { .. } => "reattach",
            Command::Extract { .. } => "extract",
            Command::RemotePayload { .. } => "remote-payload",
        }
    }
}

impl Args {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency.
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::RemotePayload { files, .. } if files.is_empty() => {
                Err("remote-payload requires at least one file".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Configuration derived from command line arguments.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Get a reference to the output manager.
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print message.
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print error message (always shown).
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message.
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message.
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Check if quiet output was requested.
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}
