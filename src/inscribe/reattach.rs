//! Reattach: merge a signed engine with the original bundle's attached
//! container into the final, distributable bundle.

use crate::container::ContainerType;
use crate::error::{Context, ErrorExt, Result};
use crate::fsutil;
use crate::reader::BurnReader;
use crate::writer::BurnWriter;
use std::fs::File;
use std::io::Seek;
use std::path::Path;

/// Merge `signed_engine_path` with the attached container of `bundle_path`
/// and publish the result at `output_path`.
///
/// The attached container bytes are sourced from the *original* bundle; the
/// signed engine by definition does not contain them. Returns `true` when a
/// merge happened, `false` when the original bundle had no attached
/// container and the signed engine was already the complete bundle. The
/// latter is not an error, but callers may surface it as a distinct
/// informational exit code.
pub fn reattach_engine(
    bundle_path: &Path,
    signed_engine_path: &Path,
    output_path: &Path,
    intermediate_dir: &Path,
) -> Result<bool> {
    let mut reader = BurnReader::open(bundle_path)?;
    let attached_address = reader.attached_container_address();
    let attached_size = reader.attached_container_size();

    fsutil::ensure_dir(intermediate_dir)?;
    let mut temp = tempfile::Builder::new()
        .prefix("bundle")
        .suffix(".exe")
        .tempfile_in(intermediate_dir)
        .fs_context("creating temp bundle in", intermediate_dir)?;

    {
        let mut engine = File::open(signed_engine_path)
            .fs_context("opening signed engine", signed_engine_path)?;
        let engine_len = engine
            .metadata()
            .fs_context("reading metadata of", signed_engine_path)?
            .len();
        fsutil::copy_exact(&mut engine, temp.as_file_mut(), engine_len)?;
        temp.as_file_mut()
            .rewind()
            .fs_context("rewinding temp bundle in", intermediate_dir)?;
    }

    let did_work = if attached_size > 0 {
        // The appended container sits outside what the engine's signature
        // covers, so the signature must be neutralized first; the writer
        // rejects the append otherwise.
        let mut writer =
            BurnWriter::open(temp.path()).context("preparing the signed engine for merge")?;
        writer.remember_then_reset_signature()?;

        let source = reader.stream_from(attached_address)?;
        writer.append_container(source, attached_size, ContainerType::Attached)?;
        writer.flush()?;
        log::debug!(
            "merged {attached_size} byte attached container from {} into {}",
            bundle_path.display(),
            temp.path().display(),
        );
        true
    } else {
        log::debug!(
            "{} has no attached container; signed engine is the final bundle",
            bundle_path.display(),
        );
        false
    };

    // The default output path is the input bundle itself; close the reader
    // before renaming over it.
    drop(reader);
    fsutil::replace_file(temp, output_path)?;
    fsutil::reset_acl(output_path)?;

    log::info!(
        "reattached {} to {}",
        signed_engine_path.display(),
        output_path.display(),
    );
    Ok(did_work)
}
