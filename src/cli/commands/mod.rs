//! Command execution functions for the `burn` subcommands.
//!
//! Each executor maps its library-level result onto the process exit-code
//! contract: `0` for success, `1` for errors, and the distinct
//! [`EXIT_NO_ATTACHED_CONTAINER`] code when reattach succeeded but had
//! nothing to merge.

mod detach;
mod extract;
mod reattach;
mod remote_payload;

use crate::cli::{Args, Command, OutputManager, RuntimeConfig};
use crate::error::Result;

use detach::execute_detach;
use extract::execute_extract;
use reattach::execute_reattach;
use remote_payload::execute_remote_payload;

/// Exit code for a reattach that succeeded but found no attached container
/// to merge. Distinct from ordinary success and from error codes so callers
/// that expected merge work can react to it.
pub const EXIT_NO_ATTACHED_CONTAINER: i32 = -1000;

/// Execute the parsed command and produce a process exit code.
pub fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        // Validation errors are never quiet
        let output = OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Detach {
            input,
            engine,
            intermediate_folder,
        } => execute_detach(input, engine, intermediate_folder.as_deref(), &config),
        Command::Reattach {
            input,
            engine,
            out,
            intermediate_folder,
        } => execute_reattach(
            input,
            engine,
            out.as_deref(),
            intermediate_folder.as_deref(),
            &config,
        ),
        Command::Extract {
            input,
            out,
            intermediate_folder,
        } => execute_extract(input, out, intermediate_folder.as_deref(), &config),
        Command::RemotePayload { files, out } => {
            execute_remote_payload(files, out.as_deref(), &config)
        }
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!(
                "Command '{}' failed: {}",
                args.command.name(),
                e
            ));
            Ok(1)
        }
    }
}

/// Resolve the intermediate folder: the caller's choice, or a scratch
/// directory that lives until the command finishes.
fn intermediate_dir(
    requested: Option<&std::path::Path>,
) -> Result<(std::path::PathBuf, Option<tempfile::TempDir>)> {
    use crate::error::ErrorExt;

    match requested {
        Some(dir) => Ok((dir.to_path_buf(), None)),
        None => {
            let scratch = tempfile::tempdir().fs_context("creating scratch directory in", std::env::temp_dir())?;
            Ok((scratch.path().to_path_buf(), Some(scratch)))
        }
    }
}
