//! Minimal PE header arithmetic.
//!
//! The bundle format only needs a handful of absolute file offsets out of the
//! executable that hosts it: where the stamp section's raw data lives, where
//! the optional header's `CheckSum` field sits, and where the security data
//! directory entry (the Authenticode certificate table) is recorded. Walking
//! the DOS header, COFF header, and section table directly keeps those
//! offsets exact without pulling in a full PE object model.

use crate::error::{Error, Result};
use std::path::Path;

const IMAGE_DOS_SIGNATURE: u16 = 0x5A4D;
const IMAGE_NT_SIGNATURE: u32 = 0x0000_4550;
const MAGIC_PE32: u16 = 0x10B;
const MAGIC_PE32_PLUS: u16 = 0x20B;
const IMAGE_DIRECTORY_ENTRY_SECURITY: usize = 4;
const SECTION_HEADER_SIZE: usize = 40;

/// File offsets and header fields needed to host or mutate a bundle stamp.
#[derive(Debug, Clone)]
pub struct PeLayout {
    /// Absolute offset of the optional header `CheckSum` field.
    pub checksum_offset: u64,
    /// Current `CheckSum` value.
    pub checksum: u32,
    /// Absolute offset of the security data directory entry, if the optional
    /// header carries enough directories to have one.
    pub security_dir_offset: Option<u64>,
    /// Current certificate table file offset recorded in the security entry.
    pub cert_offset: u32,
    /// Current certificate table size recorded in the security entry.
    pub cert_size: u32,
    /// `MajorImageVersion.MinorImageVersion` from the optional header.
    pub image_version: (u16, u16),
    /// Absolute offset of the first section header.
    section_table_offset: usize,
    /// Number of entries in the section table.
    number_of_sections: usize,
}

/// A single section table entry, reduced to the fields the stamp reader uses.
#[derive(Debug, Clone, Copy)]
pub struct SectionRange {
    /// Absolute file offset of the section's raw data.
    pub pointer_to_raw_data: u32,
    /// Size of the section's raw data on disk.
    pub size_of_raw_data: u32,
}

impl PeLayout {
    /// Parse the executable headers out of `data`.
    ///
    /// `data` only needs to cover the headers and section table; callers that
    /// have the whole file mapped can pass it as-is. Fails with
    /// [`Error::NotABundle`] when the DOS/NT signatures are absent or any
    /// recorded offset walks outside the buffer.
    pub fn parse(path: &Path, data: &[u8]) -> Result<Self> {
        let reject = |reason: String| Error::NotABundle {
            path: path.to_path_buf(),
            reason,
        };

        if data.len() < 0x40 {
            return Err(reject("file too small for a DOS header".into()));
        }
        if read_u16(data, 0)? != IMAGE_DOS_SIGNATURE {
            return Err(reject("missing MZ signature".into()));
        }

        let e_lfanew = read_u32(data, 0x3C)? as usize;
        if e_lfanew + 4 + 20 > data.len() {
            return Err(reject(format!("e_lfanew {e_lfanew:#x} out of range")));
        }
        if read_u32(data, e_lfanew)? != IMAGE_NT_SIGNATURE {
            return Err(reject("missing PE signature".into()));
        }

        let coff_offset = e_lfanew + 4;
        let number_of_sections = read_u16(data, coff_offset + 2)? as usize;
        let size_of_optional_header = read_u16(data, coff_offset + 16)? as usize;
        let optional_header_offset = coff_offset + 20;
        if optional_header_offset + size_of_optional_header > data.len() {
            return Err(reject("optional header out of range".into()));
        }

        // The data directory array starts at a magic-dependent offset:
        // 96 bytes into the optional header for PE32, 112 for PE32+. The
        // CheckSum field sits at offset 64 in both formats.
        let magic = read_u16(data, optional_header_offset)?;
        let (dirs_count_offset, dirs_base) = match magic {
            MAGIC_PE32 => (92, 96),
            MAGIC_PE32_PLUS => (108, 112),
            other => return Err(reject(format!("unknown optional header magic {other:#x}"))),
        };

        let checksum_offset = optional_header_offset + 64;
        let checksum = read_u32(data, checksum_offset)?;
        let image_version = (
            read_u16(data, optional_header_offset + 48)?,
            read_u16(data, optional_header_offset + 50)?,
        );

        let number_of_rva_and_sizes =
            read_u32(data, optional_header_offset + dirs_count_offset)? as usize;
        let mut security_dir_offset = None;
        let mut cert_offset = 0;
        let mut cert_size = 0;
        if number_of_rva_and_sizes > IMAGE_DIRECTORY_ENTRY_SECURITY {
            let entry =
                optional_header_offset + dirs_base + IMAGE_DIRECTORY_ENTRY_SECURITY * 8;
            if entry + 8 > data.len() {
                return Err(reject("security directory entry out of range".into()));
            }
            security_dir_offset = Some(entry as u64);
            cert_offset = read_u32(data, entry)?;
            cert_size = read_u32(data, entry + 4)?;
        }

        let section_table_offset = optional_header_offset + size_of_optional_header;
        if section_table_offset + number_of_sections * SECTION_HEADER_SIZE > data.len() {
            return Err(reject("section table out of range".into()));
        }

        Ok(Self {
            checksum_offset: checksum_offset as u64,
            checksum,
            security_dir_offset,
            cert_offset,
            cert_size,
            image_version,
            section_table_offset,
            number_of_sections,
        })
    }

    /// Look up a section by its (at most 8 byte, NUL padded) table name.
    pub fn find_section(&self, data: &[u8], name: &[u8]) -> Result<Option<SectionRange>> {
        let mut padded = [0u8; 8];
        if name.len() > 8 {
            return Ok(None);
        }
        padded[..name.len()].copy_from_slice(name);

        for index in 0..self.number_of_sections {
            let entry = self.section_table_offset + index * SECTION_HEADER_SIZE;
            let entry_name = data
                .get(entry..entry + 8)
                .ok_or_else(|| invalid("section header out of range"))?;
            if entry_name == padded {
                return Ok(Some(SectionRange {
                    size_of_raw_data: read_u32(data, entry + 16)?,
                    pointer_to_raw_data: read_u32(data, entry + 20)?,
                }));
            }
        }
        Ok(None)
    }
}

/// Check whether the first bytes of a file look like a PE image at all.
///
/// Cheap pre-filter before header parsing; mirrors the format hint check used
/// ahead of binary patching so that text files and archives are rejected with
/// a clear message instead of an offset error.
pub fn looks_like_pe(data: &[u8]) -> bool {
    let Some(hint_bytes) = data.get(0..16).and_then(|s| <&[u8; 16]>::try_from(s).ok()) else {
        return false;
    };
    matches!(goblin::peek_bytes(hint_bytes), Ok(goblin::Hint::PE))
}

fn invalid(msg: &str) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, msg))
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> Result<u16> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| invalid("unexpected EOF while reading u16"))
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| invalid("unexpected EOF while reading u32"))
}
