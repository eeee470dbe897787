//! `burn` - work with Burn bundle containers.
//!
//! This binary drives the detach/reattach signing workflow, container
//! extraction, and payload harvesting over the library in `burn_tools`.

use burn_tools::cli;
use burn_tools::cli::OutputManager;
use std::process;

fn main() {
    env_logger::init();

    match cli::run() {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));
            process::exit(1);
        }
    }
}
