//! The Burn stamp: the fixed 512-byte structure at the start of the
//! `.wixburn` section of a bundle executable.
//!
//! The stamp is the only part of the host executable this crate interprets.
//! It records the bundle GUID, the size of the stub (everything before the
//! UX container), the original Authenticode checksum and signature range,
//! and the size of every container carried in the file. All addresses are
//! derived: the UX container starts where the stub ends, attached containers
//! start where the engine ends.
//!
//! Lookup is anchored through the PE section table rather than a linear
//! byte-string scan, so a coincidental magic match inside the stub's own
//! resources can never be mistaken for a stamp.

use crate::error::{Error, ErrorExt, Result};
use crate::pe::{self, PeLayout};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use uuid::Uuid;

/// Name of the PE section holding the stamp.
pub const BURN_SECTION_NAME: &[u8] = b".wixburn";

/// Magic value at offset 0 of the stamp.
pub const BURN_SECTION_MAGIC: u32 = 0x00F1_4300;

/// Stamp format version this crate reads and writes.
pub const BURN_SECTION_VERSION: u32 = 2;

/// Total size of the stamp structure (the minimum PE section size).
pub const BURN_SECTION_SIZE: usize = 512;

/// Container format tag: zip archive.
pub const CONTAINER_FORMAT_ZIP: u32 = 1;

/// Number of attached-container size slots in the stamp.
/// (512 - 52 bytes of fixed fields) / 4 bytes per slot.
pub const MAX_ATTACHED_CONTAINERS: usize = 115;

/// Byte offsets of the stamp fields, relative to the section start.
pub(crate) mod field {
    pub const MAGIC: u64 = 0;
    pub const VERSION: u64 = 4;
    pub const GUID: u64 = 8;
    pub const STUB_SIZE: u64 = 24;
    pub const ORIGINAL_CHECKSUM: u64 = 28;
    pub const ORIGINAL_SIGNATURE_OFFSET: u64 = 32;
    pub const ORIGINAL_SIGNATURE_SIZE: u64 = 36;
    pub const CONTAINER_FORMAT: u64 = 40;
    pub const CONTAINER_COUNT: u64 = 44;
    pub const UX_CONTAINER_SIZE: u64 = 48;
    pub const ATTACHED_CONTAINER_SIZES: u64 = 52;
}

/// How much of the stamp's arithmetic must fit the actual file.
///
/// A complete bundle must hold every container it records. A freshly
/// detached engine is different: it still carries the original stamp, whose
/// attached-container bookkeeping describes bytes that were deliberately
/// left behind and will be rewritten on reattach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Require every recorded container to fit inside the file.
    Full,
    /// Require only the engine region to fit; attached bookkeeping may be
    /// stale on a detached engine that is about to be rewritten.
    EngineOnly,
}

/// Parsed stamp contents plus where the stamp lives in the file.
#[derive(Debug, Clone)]
pub struct BurnStamp {
    /// Absolute file offset of the stamp (the section's raw data pointer).
    pub section_offset: u64,
    /// Bundle identity GUID written at build time.
    pub guid: Uuid,
    /// Bytes before the UX container: stub code, headers, and the stamp
    /// section itself.
    pub stub_size: u32,
    /// PE checksum recorded before the signature was neutralized.
    pub original_checksum: u32,
    /// Certificate table offset recorded before neutralization.
    pub original_signature_offset: u32,
    /// Certificate table size recorded before neutralization.
    pub original_signature_size: u32,
    /// Archive format tag for all containers in this bundle.
    pub container_format: u32,
    /// Number of containers present, UX included.
    pub container_count: u32,
    /// Size of the UX container in bytes.
    pub ux_container_size: u32,
    /// Sizes of the attached containers, in file order.
    pub attached_container_sizes: [u32; MAX_ATTACHED_CONTAINERS],
}

impl BurnStamp {
    /// Size of the engine region: stub plus UX container. This is the unit
    /// that gets detached for signing.
    pub fn engine_size(&self) -> u64 {
        u64::from(self.stub_size) + u64::from(self.ux_container_size)
    }

    /// Absolute file offset of the UX container.
    pub fn ux_container_address(&self) -> u64 {
        u64::from(self.stub_size)
    }

    /// Absolute file offset of the first attached container.
    pub fn attached_container_address(&self) -> u64 {
        self.engine_size()
    }

    /// Number of attached containers (containers beyond the UX container).
    pub fn attached_container_count(&self) -> usize {
        (self.container_count as usize).saturating_sub(1)
    }

    /// Total size of all attached containers in bytes.
    pub fn attached_container_size(&self) -> u64 {
        self.attached_container_sizes
            .iter()
            .take(self.attached_container_count().min(MAX_ATTACHED_CONTAINERS))
            .map(|size| u64::from(*size))
            .sum()
    }

    /// Serialize the stamp back into its 512-byte on-disk form.
    pub fn encode(&self) -> [u8; BURN_SECTION_SIZE] {
        let mut out = [0u8; BURN_SECTION_SIZE];
        put_u32(&mut out, field::MAGIC, BURN_SECTION_MAGIC);
        put_u32(&mut out, field::VERSION, BURN_SECTION_VERSION);
        out[field::GUID as usize..field::GUID as usize + 16]
            .copy_from_slice(self.guid.as_bytes());
        put_u32(&mut out, field::STUB_SIZE, self.stub_size);
        put_u32(&mut out, field::ORIGINAL_CHECKSUM, self.original_checksum);
        put_u32(
            &mut out,
            field::ORIGINAL_SIGNATURE_OFFSET,
            self.original_signature_offset,
        );
        put_u32(
            &mut out,
            field::ORIGINAL_SIGNATURE_SIZE,
            self.original_signature_size,
        );
        put_u32(&mut out, field::CONTAINER_FORMAT, self.container_format);
        put_u32(&mut out, field::CONTAINER_COUNT, self.container_count);
        put_u32(&mut out, field::UX_CONTAINER_SIZE, self.ux_container_size);
        for (index, size) in self.attached_container_sizes.iter().enumerate() {
            put_u32(
                &mut out,
                field::ATTACHED_CONTAINER_SIZES + (index as u64) * 4,
                *size,
            );
        }
        out
    }

    /// Parse a stamp out of its raw 512 bytes and validate its arithmetic
    /// against the size of the file that holds it.
    pub fn parse(
        path: &Path,
        section_offset: u64,
        raw: &[u8],
        file_len: u64,
        validation: Validation,
    ) -> Result<Self> {
        let reject = |reason: String| Error::NotABundle {
            path: path.to_path_buf(),
            reason,
        };

        if raw.len() < BURN_SECTION_SIZE {
            return Err(reject(format!(
                "stamp section is {} bytes, expected at least {BURN_SECTION_SIZE}",
                raw.len()
            )));
        }

        let magic = pe::read_u32(raw, field::MAGIC as usize)?;
        if magic != BURN_SECTION_MAGIC {
            return Err(reject(format!("bad stamp magic {magic:#010x}")));
        }
        let version = pe::read_u32(raw, field::VERSION as usize)?;
        if version != BURN_SECTION_VERSION {
            return Err(reject(format!("unsupported stamp version {version}")));
        }

        let mut guid_bytes = [0u8; 16];
        guid_bytes.copy_from_slice(&raw[field::GUID as usize..field::GUID as usize + 16]);

        let mut stamp = Self {
            section_offset,
            guid: Uuid::from_bytes(guid_bytes),
            stub_size: pe::read_u32(raw, field::STUB_SIZE as usize)?,
            original_checksum: pe::read_u32(raw, field::ORIGINAL_CHECKSUM as usize)?,
            original_signature_offset: pe::read_u32(
                raw,
                field::ORIGINAL_SIGNATURE_OFFSET as usize,
            )?,
            original_signature_size: pe::read_u32(
                raw,
                field::ORIGINAL_SIGNATURE_SIZE as usize,
            )?,
            container_format: pe::read_u32(raw, field::CONTAINER_FORMAT as usize)?,
            container_count: pe::read_u32(raw, field::CONTAINER_COUNT as usize)?,
            ux_container_size: pe::read_u32(raw, field::UX_CONTAINER_SIZE as usize)?,
            attached_container_sizes: [0u32; MAX_ATTACHED_CONTAINERS],
        };
        for index in 0..MAX_ATTACHED_CONTAINERS {
            stamp.attached_container_sizes[index] = pe::read_u32(
                raw,
                field::ATTACHED_CONTAINER_SIZES as usize + index * 4,
            )?;
        }

        stamp.validate(path, file_len, validation)?;
        Ok(stamp)
    }

    /// Validate-then-trust: any arithmetic that does not fit inside the
    /// actual file rejects the stamp outright.
    fn validate(&self, path: &Path, file_len: u64, validation: Validation) -> Result<()> {
        let reject = |reason: String| Error::NotABundle {
            path: path.to_path_buf(),
            reason,
        };

        if self.stub_size == 0 {
            return Err(reject("stamp records a zero stub size".into()));
        }
        if self.section_offset + BURN_SECTION_SIZE as u64 > u64::from(self.stub_size) {
            return Err(reject("stamp section extends past the recorded stub".into()));
        }
        if self.container_count as usize > 1 + MAX_ATTACHED_CONTAINERS {
            return Err(reject(format!(
                "container count {} exceeds the stamp's capacity",
                self.container_count
            )));
        }
        if self.ux_container_size > 0 && self.container_count == 0 {
            return Err(reject(
                "UX container recorded but container count is zero".into(),
            ));
        }
        let expected = match validation {
            Validation::Full => self.engine_size() + self.attached_container_size(),
            Validation::EngineOnly => self.engine_size(),
        };
        if expected > file_len {
            return Err(reject(format!(
                "stamp records {expected} bytes of content but the file is only {file_len}"
            )));
        }
        Ok(())
    }

    /// Locate and parse the stamp in an open bundle file.
    ///
    /// Reads the executable headers, walks the section table for the
    /// [`BURN_SECTION_NAME`] section, and parses the stamp found there.
    /// Returns the host layout alongside the stamp so writers can patch the
    /// checksum and security directory without re-reading the headers.
    pub fn find(
        path: &Path,
        file: &mut File,
        validation: Validation,
    ) -> Result<(PeLayout, Self)> {
        let file_len = file
            .metadata()
            .fs_context("reading metadata of", path)?
            .len();

        // Headers and section table always sit at the front of the image.
        let header_len = file_len.min(64 * 1024) as usize;
        let mut header = vec![0u8; header_len];
        file.seek(SeekFrom::Start(0)).fs_context("seeking in", path)?;
        file.read_exact(&mut header)
            .fs_context("reading headers of", path)?;

        if !pe::looks_like_pe(&header) {
            return Err(Error::NotABundle {
                path: path.to_path_buf(),
                reason: "not a PE executable".into(),
            });
        }

        let layout = PeLayout::parse(path, &header)?;
        let section = layout
            .find_section(&header, BURN_SECTION_NAME)?
            .ok_or_else(|| Error::NotABundle {
                path: path.to_path_buf(),
                reason: "no .wixburn section".into(),
            })?;

        let section_offset = u64::from(section.pointer_to_raw_data);
        if (section.size_of_raw_data as usize) < BURN_SECTION_SIZE
            || section_offset + BURN_SECTION_SIZE as u64 > file_len
        {
            return Err(Error::NotABundle {
                path: path.to_path_buf(),
                reason: "stamp section is truncated".into(),
            });
        }

        let mut raw = [0u8; BURN_SECTION_SIZE];
        file.seek(SeekFrom::Start(section_offset))
            .fs_context("seeking in", path)?;
        file.read_exact(&mut raw)
            .fs_context("reading stamp section of", path)?;

        log::debug!(
            "found stamp at {section_offset:#x} in {}: guid {}, stub {} bytes",
            path.display(),
            Uuid::from_slice(&raw[field::GUID as usize..field::GUID as usize + 16])
                .unwrap_or_default(),
            pe::read_u32(&raw, field::STUB_SIZE as usize).unwrap_or(0),
        );

        let stamp = Self::parse(path, section_offset, &raw, file_len, validation)?;
        Ok((layout, stamp))
    }
}

fn put_u32(buf: &mut [u8], offset: u64, value: u32) {
    let offset = offset as usize;
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample() -> BurnStamp {
        let mut stamp = BurnStamp {
            section_offset: 1024,
            guid: Uuid::from_bytes([7u8; 16]),
            stub_size: 1536,
            original_checksum: 0,
            original_signature_offset: 0,
            original_signature_size: 0,
            container_format: CONTAINER_FORMAT_ZIP,
            container_count: 2,
            ux_container_size: 300,
            attached_container_sizes: [0u32; MAX_ATTACHED_CONTAINERS],
        };
        stamp.attached_container_sizes[0] = 75;
        stamp
    }

    #[test]
    fn derived_addresses() {
        let stamp = sample();
        assert_eq!(stamp.engine_size(), 1836);
        assert_eq!(stamp.ux_container_address(), 1536);
        assert_eq!(stamp.attached_container_address(), 1836);
        assert_eq!(stamp.attached_container_size(), 75);
        assert_eq!(stamp.attached_container_count(), 1);
    }

    #[test]
    fn encode_parse_preserves_fields() {
        let stamp = sample();
        let raw = stamp.encode();
        let parsed = BurnStamp::parse(
            &PathBuf::from("fake.exe"),
            1024,
            &raw,
            4096,
            Validation::Full,
        )
        .unwrap();
        assert_eq!(parsed.guid, stamp.guid);
        assert_eq!(parsed.stub_size, stamp.stub_size);
        assert_eq!(parsed.container_count, 2);
        assert_eq!(parsed.attached_container_sizes[0], 75);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut raw = sample().encode();
        raw[0] ^= 0xFF;
        let err = BurnStamp::parse(
            &PathBuf::from("fake.exe"),
            1024,
            &raw,
            4096,
            Validation::Full,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotABundle { .. }));
    }

    #[test]
    fn rejects_sizes_past_end_of_file() {
        let stamp = sample();
        let raw = stamp.encode();
        // engine (1836) + attached (75) > 1900
        let err = BurnStamp::parse(
            &PathBuf::from("fake.exe"),
            1024,
            &raw,
            1900,
            Validation::Full,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotABundle { .. }));
    }

    #[test]
    fn engine_only_validation_tolerates_stale_attached_bookkeeping() {
        // A detached engine is exactly engine_size() bytes but still records
        // the attached container it left behind.
        let raw = sample().encode();
        let parsed = BurnStamp::parse(
            &PathBuf::from("engine.exe"),
            1024,
            &raw,
            1836,
            Validation::EngineOnly,
        )
        .unwrap();
        assert_eq!(parsed.engine_size(), 1836);

        let err = BurnStamp::parse(
            &PathBuf::from("engine.exe"),
            1024,
            &raw,
            1836,
            Validation::Full,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotABundle { .. }));
    }

    #[test]
    fn rejects_truncated_section() {
        let raw = sample().encode();
        let err = BurnStamp::parse(
            &PathBuf::from("fake.exe"),
            1024,
            &raw[..100],
            4096,
            Validation::Full,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotABundle { .. }));
    }
}
