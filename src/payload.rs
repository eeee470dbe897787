//! Bulk harvesting of payload metadata and Authenticode trust data.
//!
//! For every candidate file two passes run: an always-available metadata
//! pass (name, size, content hash, binary version) and a best-effort
//! certificate pass that digs the signer certificate out of the embedded
//! Authenticode signature to derive thumbprints for trust pinning. A failure
//! in the certificate pass is captured on that file's record and never
//! aborts the batch.

use crate::error::{ErrorExt, Result};
use crate::pe::{self, PeLayout};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier};
use der::{Decode, Encode};
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use x509_cert::Certificate;

/// Authenticode certificate table entry type for PKCS#7 signed data.
const WIN_CERT_TYPE_PKCS_SIGNED_DATA: u16 = 0x0002;

/// Harvested facts about one payload file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadRecord {
    /// Path the file was harvested from.
    pub file: PathBuf,
    /// File name component, as referenced from authoring.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// SHA-256 of the file contents, lowercase hex.
    pub hash: String,
    /// Binary image version, when the file is a PE image that carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// SHA-1 of the signer certificate's public key, uppercase hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_public_key: Option<String>,
    /// SHA-1 of the signer certificate, uppercase hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_thumbprint: Option<String>,
    /// Error from the certificate pass, if it failed for this file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Harvest every path in `paths`.
///
/// Each file yields exactly one record. Files without a valid signature get
/// metadata only, which is not an error; files whose certificate data cannot
/// be read get the failure text in their record's `error` field.
pub fn harvest_files(paths: &[PathBuf]) -> Vec<PayloadRecord> {
    paths.iter().map(|path| harvest_one(path)).collect()
}

fn harvest_one(path: &Path) -> PayloadRecord {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut record = PayloadRecord {
        file: path.to_path_buf(),
        name,
        size: 0,
        hash: String::new(),
        version: None,
        certificate_public_key: None,
        certificate_thumbprint: None,
        error: None,
    };

    match harvest_metadata(path, &mut record) {
        Ok(header) => {
            if let Err(e) = harvest_certificate(path, &header, &mut record) {
                log::warn!(
                    "could not read certificate data from {}: {e}",
                    path.display()
                );
                record.error = Some(e.to_string());
            }
        }
        Err(e) => {
            log::warn!("could not harvest {}: {e}", path.display());
            record.error = Some(e.to_string());
        }
    }

    record
}

/// The always-available pass: size, content hash, and image version.
/// Returns the header bytes so the certificate pass can reuse them.
fn harvest_metadata(path: &Path, record: &mut PayloadRecord) -> Result<Vec<u8>> {
    let mut file = File::open(path).fs_context("opening payload", path)?;
    record.size = file
        .metadata()
        .fs_context("reading metadata of", path)?
        .len();

    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).fs_context("hashing payload", path)?;
    record.hash = hex::encode(hasher.finalize());

    let header_len = record.size.min(64 * 1024) as usize;
    let mut header = vec![0u8; header_len];
    file.seek(SeekFrom::Start(0)).fs_context("seeking in", path)?;
    file.read_exact(&mut header).fs_context("reading headers of", path)?;

    if pe::looks_like_pe(&header) {
        if let Ok(layout) = PeLayout::parse(path, &header) {
            let (major, minor) = layout.image_version;
            if major != 0 || minor != 0 {
                record.version = Some(format!("{major}.{minor}.0.0"));
            }
        }
    }

    Ok(header)
}

/// The best-effort pass: locate the certificate table, open the PKCS#7
/// envelope, pick the signer certificate, and derive its thumbprints.
fn harvest_certificate(path: &Path, header: &[u8], record: &mut PayloadRecord) -> Result<()> {
    if !pe::looks_like_pe(header) {
        // Not signable content; metadata-only is the expected outcome.
        return Ok(());
    }
    let layout = match PeLayout::parse(path, header) {
        Ok(layout) => layout,
        Err(_) => return Ok(()),
    };
    if layout.cert_offset == 0 || layout.cert_size == 0 {
        log::debug!("{} carries no certificate table", path.display());
        return Ok(());
    }

    let mut file = File::open(path).fs_context("opening payload", path)?;
    file.seek(SeekFrom::Start(u64::from(layout.cert_offset)))
        .fs_context("seeking to certificate table in", path)?;
    let mut table = vec![0u8; layout.cert_size as usize];
    file.read_exact(&mut table)
        .fs_context("reading certificate table of", path)?;

    // WIN_CERTIFICATE: u32 length (header included), u16 revision, u16 type.
    let entry_len = pe::read_u32(&table, 0)? as usize;
    let cert_type = pe::read_u16(&table, 6)?;
    if cert_type != WIN_CERT_TYPE_PKCS_SIGNED_DATA {
        crate::bail!("unsupported certificate entry type {cert_type:#06x}");
    }
    if entry_len < 8 || entry_len > table.len() {
        crate::bail!("certificate entry length {entry_len} does not fit its table");
    }
    let pkcs7 = &table[8..entry_len];

    let content_info = ContentInfo::from_der(pkcs7)
        .map_err(|e| crate::error::Error::Generic(format!("invalid PKCS#7 envelope: {e}")))?;
    let signed_data_der = content_info
        .content
        .to_der()
        .map_err(|e| crate::error::Error::Generic(format!("invalid SignedData: {e}")))?;
    let signed_data = SignedData::from_der(&signed_data_der)
        .map_err(|e| crate::error::Error::Generic(format!("invalid SignedData: {e}")))?;

    let signer = select_signer_certificate(&signed_data)
        .ok_or_else(|| crate::error::Error::Generic("no signer certificate present".into()))?;

    let cert_der = signer
        .to_der()
        .map_err(|e| crate::error::Error::Generic(format!("re-encoding certificate: {e}")))?;
    let spki_der = signer
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| crate::error::Error::Generic(format!("re-encoding public key: {e}")))?;

    record.certificate_thumbprint = Some(sha1_hex(&cert_der));
    record.certificate_public_key = Some(sha1_hex(&spki_der));
    log::debug!(
        "harvested certificate thumbprint {} from {}",
        record.certificate_thumbprint.as_deref().unwrap_or(""),
        path.display(),
    );
    Ok(())
}

/// Pick the certificate belonging to the first signer, falling back to the
/// first certificate in the envelope when the signer identifier does not
/// match any of them.
fn select_signer_certificate(signed_data: &SignedData) -> Option<Certificate> {
    let certs = signed_data.certificates.as_ref()?;
    let certificates: Vec<&Certificate> = certs
        .0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(cert),
            _ => None,
        })
        .collect();

    for signer_info in signed_data.signer_infos.0.iter() {
        if let SignerIdentifier::IssuerAndSerialNumber(issuer_and_serial) = &signer_info.sid {
            for cert in &certificates {
                if cert.tbs_certificate.serial_number.as_bytes()
                    == issuer_and_serial.serial_number.as_bytes()
                {
                    return Some((*cert).clone());
                }
            }
        }
    }

    certificates.first().map(|cert| (*cert).clone())
}

fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode_upper(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_file_yields_metadata_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"some payload bytes").unwrap();

        let records = harvest_files(&[path.clone()]);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "payload.bin");
        assert_eq!(record.size, 18);
        assert_eq!(record.hash.len(), 64);
        assert!(record.certificate_thumbprint.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn missing_file_is_captured_per_record() {
        let records = harvest_files(&[PathBuf::from("/nonexistent/payload.dll")]);
        assert_eq!(records.len(), 1);
        assert!(records[0].error.is_some());
        assert_eq!(records[0].size, 0);
    }

    #[test]
    fn records_serialize_with_camel_case_fields() {
        let record = PayloadRecord {
            file: PathBuf::from("a.dll"),
            name: "a.dll".into(),
            size: 10,
            hash: "ff".into(),
            version: Some("1.2.0.0".into()),
            certificate_public_key: None,
            certificate_thumbprint: None,
            error: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"certificatePublicKey\""));
        assert!(json.contains("\"version\":\"1.2.0.0\""));
    }
}
