//! `burn remote-payload` executor.

use crate::cli::RuntimeConfig;
use crate::error::{ErrorExt, Result};
use crate::payload;
use std::path::{Path, PathBuf};

pub fn execute_remote_payload(
    files: &[PathBuf],
    out: Option<&Path>,
    config: &RuntimeConfig,
) -> Result<i32> {
    let records = payload::harvest_files(files);
    // A record with an empty hash never got past the metadata pass.
    let harvested = records.iter().filter(|r| !r.hash.is_empty()).count();
    let failures = records.iter().filter(|r| r.error.is_some()).count();
    let report = serde_json::to_string_pretty(&records)?;

    match out {
        Some(path) => {
            std::fs::write(path, report).fs_context("writing harvest report", path)?;
            config.success_println(&format!(
                "Harvested {} file(s) to {}",
                records.len(),
                path.display()
            ));
        }
        None => config.println(&report),
    }

    if failures > 0 {
        config.warning_println(&format!(
            "{failures} file(s) reported harvest errors; see the 'error' field"
        ));
    }
    if harvested == 0 {
        config.error_println("No file could be harvested");
        return Ok(1);
    }
    Ok(0)
}
