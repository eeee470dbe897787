//! The archive seam: containers are opaque compressed payloads.
//!
//! The reader and writer only ever handle `(offset, length)` byte ranges;
//! this module is the one place that knows the range holds a zip archive.
//! Keeping the codec behind `pack`/`unpack` means the container internals
//! never leak into the byte-offset arithmetic that makes bundles fragile.

use crate::error::{Error, ErrorExt, Result};
use crate::fsutil;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Which container a byte range holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    /// The bootstrapper-application payload; part of the signed engine.
    Ux,
    /// Embedded package payloads appended after the engine.
    Attached,
}

impl ContainerType {
    /// Label used in log and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ContainerType::Ux => "UX",
            ContainerType::Attached => "attached",
        }
    }
}

/// Pack the contents of `source_dir` into a container archive at `dest`.
///
/// Entry names are paths relative to `source_dir`. Primarily used by build
/// tooling and tests; the inscribe pipeline itself never repacks containers.
pub fn pack_dir(source_dir: &Path, dest: &Path) -> Result<()> {
    let file = File::create(dest).fs_context("creating container", dest)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(source_dir)?;
        let name = rel.to_string_lossy().replace('\\', "/");
        writer.start_file(name, options)?;
        let mut source =
            File::open(entry.path()).fs_context("opening payload file", entry.path())?;
        std::io::copy(&mut source, &mut writer)
            .fs_context("packing payload file", entry.path())?;
    }

    writer.finish()?.flush().fs_context("flushing container", dest)?;
    Ok(())
}

/// Stage `length` bytes starting at `address` in `bundle` into a temp file
/// under `temp_dir`, then unpack the staged archive into `dest_dir`.
///
/// Codec failures are reported as [`Error::ExtractionFailed`] tagged with the
/// container label so callers can decide whether the failure is fatal (UX)
/// or merely worth a warning (attached, on the introspection path).
pub fn unpack_range(
    bundle: &mut File,
    bundle_path: &Path,
    address: u64,
    length: u64,
    kind: ContainerType,
    dest_dir: &Path,
    temp_dir: &Path,
) -> Result<()> {
    fsutil::ensure_dir(temp_dir)?;
    fsutil::ensure_dir(dest_dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix("container")
        .suffix(".tmp")
        .tempfile_in(temp_dir)
        .fs_context("creating staging file in", temp_dir)?;

    bundle
        .seek(SeekFrom::Start(address))
        .fs_context("seeking in", bundle_path)?;
    fsutil::copy_exact(bundle, staged.as_file_mut(), length)?;
    staged
        .as_file_mut()
        .seek(SeekFrom::Start(0))
        .fs_context("rewinding staging file in", temp_dir)?;

    log::debug!(
        "staged {length} bytes of {} container from {:#x} for extraction into {}",
        kind.label(),
        address,
        dest_dir.display(),
    );

    let mut archive = ZipArchive::new(staged.as_file_mut()).map_err(|e| {
        Error::ExtractionFailed {
            container: kind.label(),
            reason: e.to_string(),
        }
    })?;
    archive
        .extract(dest_dir)
        .map_err(|e| Error::ExtractionFailed {
            container: kind.label(),
            reason: e.to_string(),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_then_unpack_restores_the_tree() {
        let work = tempfile::tempdir().unwrap();
        let payload = work.path().join("payload");
        std::fs::create_dir_all(payload.join("sub")).unwrap();
        std::fs::write(payload.join("manifest.xml"), b"<Bundle/>").unwrap();
        std::fs::write(payload.join("sub/app.dll"), vec![0x4D, 0x5A, 0, 1, 2]).unwrap();

        let archive = work.path().join("ux.zip");
        pack_dir(&payload, &archive).unwrap();
        let archive_len = std::fs::metadata(&archive).unwrap().len();

        let mut file = File::open(&archive).unwrap();
        let out = work.path().join("out");
        unpack_range(
            &mut file,
            &archive,
            0,
            archive_len,
            ContainerType::Ux,
            &out,
            work.path(),
        )
        .unwrap();

        assert_eq!(std::fs::read(out.join("manifest.xml")).unwrap(), b"<Bundle/>");
        assert_eq!(
            std::fs::read(out.join("sub/app.dll")).unwrap(),
            vec![0x4D, 0x5A, 0, 1, 2]
        );
    }

    #[test]
    fn garbage_bytes_report_extraction_failed() {
        let work = tempfile::tempdir().unwrap();
        let garbage = work.path().join("garbage.bin");
        std::fs::write(&garbage, vec![0xEE; 256]).unwrap();

        let mut file = File::open(&garbage).unwrap();
        let err = unpack_range(
            &mut file,
            &garbage,
            0,
            256,
            ContainerType::Attached,
            &work.path().join("out"),
            work.path(),
        )
        .unwrap_err();

        match err {
            Error::ExtractionFailed { container, .. } => assert_eq!(container, "attached"),
            other => panic!("expected ExtractionFailed, got {other:?}"),
        }
    }

    #[test]
    fn unpack_respects_the_recorded_range() {
        // Archive preceded by stub bytes, exactly like a container inside a
        // bundle. Unpacking must start at the recorded address, not zero.
        let work = tempfile::tempdir().unwrap();
        let payload = work.path().join("payload");
        std::fs::create_dir_all(&payload).unwrap();
        std::fs::write(payload.join("a.txt"), b"attached bytes").unwrap();
        let archive = work.path().join("inner.zip");
        pack_dir(&payload, &archive).unwrap();
        let archive_bytes = std::fs::read(&archive).unwrap();

        let combined = work.path().join("combined.bin");
        let mut data = vec![0x90u8; 777];
        data.extend_from_slice(&archive_bytes);
        std::fs::write(&combined, &data).unwrap();

        let mut file = File::open(&combined).unwrap();
        let out = work.path().join("out");
        unpack_range(
            &mut file,
            &combined,
            777,
            archive_bytes.len() as u64,
            ContainerType::Attached,
            &out,
            work.path(),
        )
        .unwrap();
        assert_eq!(std::fs::read(out.join("a.txt")).unwrap(), b"attached bytes");
    }
}
