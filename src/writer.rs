//! Read-write access to a bundle under mutation.
//!
//! `BurnWriter` owns the two mutations the inscribe pipeline needs: stripping
//! a now-stale Authenticode signature while remembering where it was, and
//! appending container bytes to the end of the file while keeping the
//! stamp's bookkeeping consistent.
//!
//! The signature byte range is treated as a single logical resource: it must
//! be explicitly neutralized through [`BurnWriter::remember_then_reset_signature`]
//! before any other mutation touches the file, and
//! [`BurnWriter::append_container`] refuses to run while a live signature is
//! still present.

use crate::container::ContainerType;
use crate::error::{Error, ErrorExt, Result};
use crate::fsutil;
use crate::pe::PeLayout;
use crate::stamp::{field, BurnStamp, Validation};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Bundle opened for mutation.
#[derive(Debug)]
pub struct BurnWriter {
    path: PathBuf,
    file: File,
    layout: PeLayout,
    stamp: BurnStamp,
    signature_reset: bool,
}

impl BurnWriter {
    /// Open `path` read-write and parse its stamp and host headers.
    ///
    /// Validation is engine-only: the usual writer input is a detached
    /// engine whose stamp still records attached containers the file does
    /// not carry. Appending rewrites that bookkeeping.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .fs_context("opening bundle for writing", &path)?;
        let (layout, stamp) = BurnStamp::find(&path, &mut file, Validation::EngineOnly)?;
        Ok(Self {
            path,
            file,
            layout,
            stamp,
            signature_reset: false,
        })
    }

    /// Path the writer was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stamp as of the last mutation through this writer.
    pub fn stamp(&self) -> &BurnStamp {
        &self.stamp
    }

    /// Whether the signature has been neutralized through this writer.
    pub fn signature_reset(&self) -> bool {
        self.signature_reset
    }

    /// True while the file still carries a certificate table entry that this
    /// writer has not neutralized.
    fn has_live_signature(&self) -> bool {
        !self.signature_reset && self.layout.cert_size > 0
    }

    /// Record the current PE checksum and certificate table range into the
    /// stamp, then neutralize both in the file.
    ///
    /// After this call the file carries no signature and no checksum; the
    /// remembered values let the runtime engine reconstruct the signed
    /// region. If the certificate blob sits at the end of the file it is
    /// truncated off entirely.
    pub fn remember_then_reset_signature(&mut self) -> Result<()> {
        if self.signature_reset {
            return Ok(());
        }

        let checksum = self.layout.checksum;
        let cert_offset = self.layout.cert_offset;
        let cert_size = self.layout.cert_size;

        self.write_stamp_u32(field::ORIGINAL_CHECKSUM, checksum)?;
        self.write_stamp_u32(field::ORIGINAL_SIGNATURE_OFFSET, cert_offset)?;
        self.write_stamp_u32(field::ORIGINAL_SIGNATURE_SIZE, cert_size)?;
        self.stamp.original_checksum = checksum;
        self.stamp.original_signature_offset = cert_offset;
        self.stamp.original_signature_size = cert_size;

        self.write_file_u32(self.layout.checksum_offset, 0)?;
        if let Some(entry) = self.layout.security_dir_offset {
            self.write_file_u32(entry, 0)?;
            self.write_file_u32(entry + 4, 0)?;
        }

        if cert_offset > 0 && cert_size > 0 {
            let file_len = self
                .file
                .metadata()
                .fs_context("reading metadata of", &self.path)?
                .len();
            if u64::from(cert_offset) + u64::from(cert_size) == file_len {
                self.file
                    .set_len(u64::from(cert_offset))
                    .fs_context("truncating certificate table from", &self.path)?;
                log::debug!(
                    "truncated {} byte certificate table from the end of {}",
                    cert_size,
                    self.path.display(),
                );
            }
        }

        self.signature_reset = true;
        log::debug!(
            "reset signature on {}: remembered checksum {checksum:#010x}, cert {cert_offset:#x}+{cert_size:#x}",
            self.path.display(),
        );
        Ok(())
    }

    /// Copy exactly `length` bytes from `source` into the file at the
    /// container's recorded address and record the new container in the
    /// stamp.
    ///
    /// `source` is consumed from its current position. The file is truncated
    /// to the container address before writing: certificate tables are
    /// 8-byte aligned, so a signed engine can carry alignment padding past
    /// the engine end even after the signature reset, and an attached
    /// container must land exactly at `attached_container_address()`.
    /// Refuses to run while the file still carries a live signature; a
    /// short source is a fatal I/O error.
    pub fn append_container<R: Read + ?Sized>(
        &mut self,
        source: &mut R,
        length: u64,
        kind: ContainerType,
    ) -> Result<()> {
        if self.has_live_signature() {
            return Err(Error::StaleSignature {
                path: self.path.clone(),
            });
        }
        if kind == ContainerType::Attached && self.stamp.attached_container_count() > 1 {
            return Err(Error::Generic(format!(
                "{} records multiple attached containers; only bundles with a single attached container can be rewritten",
                self.path.display()
            )));
        }

        let start = match kind {
            ContainerType::Ux => self.stamp.ux_container_address(),
            ContainerType::Attached => self.stamp.attached_container_address(),
        };
        let file_len = self
            .file
            .metadata()
            .fs_context("reading metadata of", &self.path)?
            .len();
        if file_len < start {
            return Err(Error::Generic(format!(
                "{} is {file_len} bytes, too short to hold a container at {start:#x}",
                self.path.display()
            )));
        }
        if file_len > start {
            log::debug!(
                "discarding {} trailing bytes before the {} container in {}",
                file_len - start,
                kind.label(),
                self.path.display(),
            );
            self.file
                .set_len(start)
                .fs_context("truncating trailing bytes from", &self.path)?;
        }

        self.file
            .seek(SeekFrom::Start(start))
            .fs_context("seeking in", &self.path)?;
        fsutil::copy_exact(source, &mut self.file, length)?;

        // The stamp on a detached engine still carries the original bundle's
        // bookkeeping, so sizes and the count are overwritten rather than
        // incremented from whatever is on disk.
        let size = container_size_u32(length)?;
        let count = match kind {
            ContainerType::Ux => {
                self.write_stamp_u32(field::UX_CONTAINER_SIZE, size)?;
                self.stamp.ux_container_size = size;
                1
            }
            ContainerType::Attached => {
                self.write_stamp_u32(field::ATTACHED_CONTAINER_SIZES, size)?;
                self.stamp.attached_container_sizes[0] = size;
                2
            }
        };
        self.write_stamp_u32(field::CONTAINER_COUNT, count)?;
        self.stamp.container_count = count;

        self.file.flush().fs_context("flushing", &self.path)?;
        log::info!(
            "appended {length} byte {} container to {} at {start:#x}",
            kind.label(),
            self.path.display(),
        );
        Ok(())
    }

    /// Flush pending writes to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().fs_context("flushing", &self.path)
    }

    fn write_stamp_u32(&mut self, field_offset: u64, value: u32) -> Result<()> {
        let offset = self.stamp.section_offset + field_offset;
        self.write_file_u32(offset, value)
    }

    fn write_file_u32(&mut self, offset: u64, value: u32) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .fs_context("seeking in", &self.path)?;
        self.file
            .write_all(&value.to_le_bytes())
            .fs_context("writing to", &self.path)
    }
}

fn container_size_u32(length: u64) -> Result<u32> {
    u32::try_from(length).map_err(|_| {
        Error::Generic(format!(
            "container of {length} bytes exceeds the stamp's 4 GiB size field"
        ))
    })
}
