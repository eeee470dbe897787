//! Detach: copy the unsigned engine out of a bundle for external signing.

use crate::error::{Error, ErrorExt, Result};
use crate::fsutil;
use crate::reader::BurnReader;
use std::path::Path;

/// Copy exactly the engine region of `bundle_path` to `engine_path`.
///
/// The cut point is always the stamp's recorded engine size, never guessed
/// from where the attached container starts. The copy is staged in
/// `intermediate_dir` and only renamed into place after the transferred
/// total has been verified; a partial copy, even one byte short, fails with
/// [`Error::EngineCopyIncomplete`] and produces no output file.
pub fn detach_engine(
    bundle_path: &Path,
    engine_path: &Path,
    intermediate_dir: &Path,
) -> Result<()> {
    let mut reader = BurnReader::open(bundle_path)?;
    let engine_size = reader.engine_size();

    fsutil::ensure_dir(intermediate_dir)?;
    let mut temp = tempfile::Builder::new()
        .prefix("engine")
        .suffix(".exe")
        .tempfile_in(intermediate_dir)
        .fs_context("creating temp engine in", intermediate_dir)?;

    log::debug!(
        "detaching {engine_size} byte engine from {} via {}",
        bundle_path.display(),
        temp.path().display(),
    );

    if let Err(e) = reader.copy_range(0, engine_size, temp.as_file_mut()) {
        // A short read here means the engine region itself was truncated.
        return Err(match e {
            Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                let copied = temp.as_file_mut().metadata().map(|m| m.len()).unwrap_or(0);
                Error::EngineCopyIncomplete {
                    expected: engine_size,
                    copied,
                }
            }
            other => other,
        });
    }

    let copied = temp
        .as_file_mut()
        .metadata()
        .fs_context("reading metadata of temp engine in", intermediate_dir)?
        .len();
    if copied != engine_size {
        return Err(Error::EngineCopyIncomplete {
            expected: engine_size,
            copied,
        });
    }

    fsutil::replace_file(temp, engine_path)?;
    fsutil::reset_acl(engine_path)?;

    log::info!(
        "detached engine ({engine_size} bytes) from {} to {}",
        bundle_path.display(),
        engine_path.display(),
    );
    Ok(())
}
