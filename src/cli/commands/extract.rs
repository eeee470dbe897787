//! `burn extract` executor.

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::reader::BurnReader;
use std::path::Path;

/// Subfolder of the output directory receiving the UX payload.
const UX_SUBFOLDER: &str = "BA";

pub fn execute_extract(
    input: &Path,
    out: &Path,
    intermediate_folder: Option<&Path>,
    config: &RuntimeConfig,
) -> Result<i32> {
    let (intermediate, _scratch) = super::intermediate_dir(intermediate_folder)?;
    let mut reader = BurnReader::open(input)?;

    // The UX container is part of the signed engine and must always unpack.
    reader.extract_ux_container(&out.join(UX_SUBFOLDER), &intermediate)?;
    config.success_println(&format!(
        "Extracted UX container to {}",
        out.join(UX_SUBFOLDER).display()
    ));

    // Attached containers are best effort on this introspection path:
    // bundles with non-standard or future container formats should produce
    // a warning, not an abort.
    match reader.extract_attached_containers(out, &intermediate) {
        Ok(true) => {
            config.success_println(&format!(
                "Extracted attached container to {}",
                out.display()
            ));
        }
        Ok(false) => {
            config.println(&format!("{} has no attached container", input.display()));
        }
        Err(e) => {
            log::warn!(
                "failed to extract attached container from {}: {e}",
                input.display()
            );
            config.warning_println(&format!(
                "Could not extract attached container: {e}"
            ));
        }
    }

    Ok(0)
}
