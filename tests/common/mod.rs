//! Shared fixtures: a minimal but structurally honest fake bundle.
//!
//! The builder produces a real PE32+ header walk (DOS header, COFF header,
//! 240 byte optional header with 16 data directories, two section table
//! entries) with the stamp section at a fixed offset, so every test runs
//! the same header arithmetic the tool runs on production bundles.

#![allow(dead_code)]

use burn_tools::stamp::{
    BurnStamp, CONTAINER_FORMAT_ZIP, MAX_ATTACHED_CONTAINERS,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Fixed stub size of every fake bundle: headers, `.text`, stamp section.
pub const STUB_SIZE: u32 = 1536;

/// Absolute file offset of the stamp section.
pub const STAMP_OFFSET: usize = 1024;

/// Absolute offset of the optional header (`e_lfanew` 0x40 + 4 + 20).
pub const OPT_HEADER_OFFSET: usize = 0x58;

/// Checksum value planted by [`apply_fake_signature`].
pub const FAKE_CHECKSUM: u32 = 0x1234_ABCD;

/// Certificate table size planted by [`apply_fake_signature`].
pub const FAKE_CERT_LEN: u32 = 16;

/// A fake bundle on disk plus the container bytes that went into it.
pub struct FakeBundle {
    pub path: PathBuf,
    pub ux: Vec<u8>,
    pub attached: Vec<u8>,
}

impl FakeBundle {
    /// Stub plus UX container, the region that gets detached for signing.
    pub fn engine_size(&self) -> u64 {
        u64::from(STUB_SIZE) + self.ux.len() as u64
    }

    pub fn bytes(&self) -> Vec<u8> {
        fs::read(&self.path).unwrap()
    }
}

pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Build the stub: PE headers, a `.text` section at 512, the stamp at 1024.
fn build_stub(ux_len: u32, attached_len: u32) -> Vec<u8> {
    let mut data = vec![0u8; STUB_SIZE as usize];
    put_u16(&mut data, 0, 0x5A4D); // MZ
    put_u32(&mut data, 0x3C, 0x40);
    put_u32(&mut data, 0x40, 0x0000_4550); // PE\0\0
    let coff = 0x44;
    put_u16(&mut data, coff, 0x8664);
    put_u16(&mut data, coff + 2, 2); // sections
    put_u16(&mut data, coff + 16, 240); // optional header size
    let opt = OPT_HEADER_OFFSET;
    put_u16(&mut data, opt, 0x20B); // PE32+
    put_u16(&mut data, opt + 48, 1); // image version 1.0
    put_u32(&mut data, opt + 108, 16); // directory count
    let sections = opt + 240;
    data[sections..sections + 5].copy_from_slice(b".text");
    put_u32(&mut data, sections + 16, 512);
    put_u32(&mut data, sections + 20, 512);
    let burn = sections + 40;
    data[burn..burn + 8].copy_from_slice(b".wixburn");
    put_u32(&mut data, burn + 16, 512);
    put_u32(&mut data, burn + 20, STAMP_OFFSET as u32);

    // Recognizable, non-zero stub code bytes.
    for (i, byte) in data[512..1024].iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }

    let mut stamp = BurnStamp {
        section_offset: STAMP_OFFSET as u64,
        guid: Uuid::from_bytes([0x42; 16]),
        stub_size: STUB_SIZE,
        original_checksum: 0,
        original_signature_offset: 0,
        original_signature_size: 0,
        container_format: CONTAINER_FORMAT_ZIP,
        container_count: if attached_len > 0 { 2 } else { 1 },
        ux_container_size: ux_len,
        attached_container_sizes: [0u32; MAX_ATTACHED_CONTAINERS],
    };
    stamp.attached_container_sizes[0] = attached_len;
    data[STAMP_OFFSET..STAMP_OFFSET + 512].copy_from_slice(&stamp.encode());
    data
}

/// A zip archive holding the given entries, as raw bytes.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Write a fake bundle with the given container bytes to `dir/name`.
pub fn write_bundle(dir: &Path, name: &str, ux: &[u8], attached: Option<&[u8]>) -> FakeBundle {
    let attached = attached.unwrap_or_default();
    let mut bytes = build_stub(ux.len() as u32, attached.len() as u32);
    bytes.extend_from_slice(ux);
    bytes.extend_from_slice(attached);
    let path = dir.join(name);
    fs::write(&path, &bytes).unwrap();
    FakeBundle {
        path,
        ux: ux.to_vec(),
        attached: attached.to_vec(),
    }
}

/// The usual fixture: a zip UX container and a 75 byte attached container.
/// The attached bytes are deliberately not a valid archive; reattach must
/// treat them as opaque.
pub fn standard_bundle(dir: &Path) -> FakeBundle {
    let ux = zip_bytes(&[("manifest.xml", b"<BootstrapperApplicationData/>" as &[u8])]);
    let attached = vec![0xA5u8; 75];
    write_bundle(dir, "bundle.exe", &ux, Some(&attached))
}

/// Append a placeholder Authenticode certificate table and point the
/// security data directory at it, the way signtool leaves a signed image.
pub fn apply_fake_signature(path: &Path) {
    sign(path, false)
}

/// Like [`apply_fake_signature`], but pads the image to an 8 byte boundary
/// first, which signtool does whenever the image size is not already
/// aligned.
pub fn apply_aligned_signature(path: &Path) {
    sign(path, true)
}

fn sign(path: &Path, align: bool) {
    let mut bytes = fs::read(path).unwrap();
    if align {
        while bytes.len() % 8 != 0 {
            bytes.push(0);
        }
    }
    let cert_offset = bytes.len() as u32;
    // WIN_CERTIFICATE: dwLength, wRevision 0x0200, wCertificateType 0x0002.
    bytes.extend_from_slice(&FAKE_CERT_LEN.to_le_bytes());
    bytes.extend_from_slice(&0x0200u16.to_le_bytes());
    bytes.extend_from_slice(&0x0002u16.to_le_bytes());
    bytes.extend_from_slice(&[0xCC; 8]);
    put_u32(&mut bytes, OPT_HEADER_OFFSET + 64, FAKE_CHECKSUM);
    put_u32(&mut bytes, OPT_HEADER_OFFSET + 144, cert_offset);
    put_u32(&mut bytes, OPT_HEADER_OFFSET + 148, FAKE_CERT_LEN);
    fs::write(path, &bytes).unwrap();
}

/// Little-endian u32 at an absolute file offset.
pub fn read_u32_at(path: &Path, offset: usize) -> u32 {
    let bytes = fs::read(path).unwrap();
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}
