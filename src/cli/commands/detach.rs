//! `burn detach` executor.

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::inscribe;
use std::path::Path;

pub fn execute_detach(
    input: &Path,
    engine: &Path,
    intermediate_folder: Option<&Path>,
    config: &RuntimeConfig,
) -> Result<i32> {
    let (intermediate, _scratch) = super::intermediate_dir(intermediate_folder)?;

    inscribe::detach_engine(input, engine, &intermediate)?;

    config.success_println(&format!(
        "Detached engine from {} to {}",
        input.display(),
        engine.display()
    ));
    Ok(0)
}
