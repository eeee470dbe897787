//! Read-only access to an existing bundle.
//!
//! `BurnReader` validates the stamp once at open and then serves byte ranges
//! out of the file: the engine region for detach, the attached container for
//! reattach, and both containers for `burn extract`. The file handle lives
//! exactly as long as the reader; dropping the reader closes it on every
//! exit path.

use crate::container::{self, ContainerType};
use crate::error::{Error, ErrorExt, Result};
use crate::fsutil;
use crate::stamp::{BurnStamp, Validation};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Open bundle with a parsed, validated stamp.
#[derive(Debug)]
pub struct BurnReader {
    path: PathBuf,
    file: File,
    stamp: BurnStamp,
}

impl BurnReader {
    /// Open `path` and locate its stamp.
    ///
    /// Fails with [`Error::NotABundle`] when the file has no stamp section
    /// or the stamp's arithmetic does not fit the file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = File::open(&path).fs_context("opening bundle", &path)?;
        let (_layout, stamp) = BurnStamp::find(&path, &mut file, Validation::Full)?;
        Ok(Self { path, file, stamp })
    }

    /// Path the reader was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed stamp.
    pub fn stamp(&self) -> &BurnStamp {
        &self.stamp
    }

    /// Size of the engine region (stub + UX container) in bytes.
    pub fn engine_size(&self) -> u64 {
        self.stamp.engine_size()
    }

    /// Absolute offset of the first attached container.
    pub fn attached_container_address(&self) -> u64 {
        self.stamp.attached_container_address()
    }

    /// Total size of the attached containers, zero when none are embedded.
    pub fn attached_container_size(&self) -> u64 {
        self.stamp.attached_container_size()
    }

    /// Copy exactly `length` bytes starting at `address` into `dest`.
    ///
    /// A source that comes up short is a fatal I/O error; the recorded
    /// lengths are trusted only after open-time validation, so any shortfall
    /// here means the file changed underneath us.
    pub fn copy_range<W: Write>(&mut self, address: u64, length: u64, dest: &mut W) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(address))
            .fs_context("seeking in", &self.path)?;
        fsutil::copy_exact(&mut self.file, dest, length)
    }

    /// Position the underlying file at `address` and hand out the handle for
    /// a sequential read. Used by reattach to stream the attached container
    /// straight into a writer-side append.
    pub fn stream_from(&mut self, address: u64) -> Result<&mut File> {
        self.file
            .seek(SeekFrom::Start(address))
            .fs_context("seeking in", &self.path)?;
        Ok(&mut self.file)
    }

    /// Unpack the UX container into `dest_dir`, staging through `temp_dir`.
    ///
    /// Strict: a corrupt UX container is a hard failure, since the UX
    /// payload is part of the signed engine and must always be readable.
    pub fn extract_ux_container(&mut self, dest_dir: &Path, temp_dir: &Path) -> Result<()> {
        if self.stamp.ux_container_size == 0 {
            return Err(Error::ExtractionFailed {
                container: ContainerType::Ux.label(),
                reason: "bundle has no UX container".into(),
            });
        }
        let address = self.stamp.ux_container_address();
        let length = u64::from(self.stamp.ux_container_size);
        container::unpack_range(
            &mut self.file,
            &self.path,
            address,
            length,
            ContainerType::Ux,
            dest_dir,
            temp_dir,
        )?;
        log::info!(
            "extracted UX container ({length} bytes) from {} into {}",
            self.path.display(),
            dest_dir.display(),
        );
        Ok(())
    }

    /// Unpack the attached containers into `dest_dir`.
    ///
    /// Best-effort by contract: bundles built with a different or future
    /// container format land here during introspection, so callers on the
    /// extract path are expected to log the typed failure and carry on
    /// rather than abort.
    pub fn extract_attached_containers(&mut self, dest_dir: &Path, temp_dir: &Path) -> Result<bool> {
        if self.stamp.attached_container_size() == 0 {
            log::debug!("{} has no attached container", self.path.display());
            return Ok(false);
        }

        let mut address = self.stamp.attached_container_address();
        for index in 0..self.stamp.attached_container_count() {
            let length = u64::from(self.stamp.attached_container_sizes[index]);
            if length == 0 {
                continue;
            }
            container::unpack_range(
                &mut self.file,
                &self.path,
                address,
                length,
                ContainerType::Attached,
                dest_dir,
                temp_dir,
            )?;
            log::info!(
                "extracted attached container #{index} ({length} bytes) from {} into {}",
                self.path.display(),
                dest_dir.display(),
            );
            address += length;
        }
        Ok(true)
    }
}
