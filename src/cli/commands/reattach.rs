//! `burn reattach` executor.

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::inscribe;
use std::path::Path;

pub fn execute_reattach(
    input: &Path,
    engine: &Path,
    out: Option<&Path>,
    intermediate_folder: Option<&Path>,
    config: &RuntimeConfig,
) -> Result<i32> {
    let (intermediate, _scratch) = super::intermediate_dir(intermediate_folder)?;
    let output = out.unwrap_or(input);

    let did_work = inscribe::reattach_engine(input, engine, output, &intermediate)?;

    if did_work {
        config.success_println(&format!(
            "Reattached signed engine to {}",
            output.display()
        ));
        Ok(0)
    } else {
        config.warning_println(&format!(
            "{} has no attached container; the signed engine was published unchanged to {}",
            input.display(),
            output.display()
        ));
        Ok(super::EXIT_NO_ATTACHED_CONTAINER)
    }
}
