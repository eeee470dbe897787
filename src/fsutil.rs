//! File system utilities shared by the reader, writer, and inscribe commands.
//!
//! The one loop that matters lives here: [`copy_exact`], the bounded-buffer
//! region copy that refuses to succeed unless the full recorded length was
//! transferred. Everything that moves container bytes goes through it.

use crate::error::{Error, ErrorExt, Result};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Buffer size for region copies. Large enough to keep syscall overhead low,
/// small enough to stay on the stack of any caller that wants it there.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Copy exactly `length` bytes from `source` to `dest`.
///
/// Reads are bounded so the copy never runs past the recorded region even if
/// the source has more bytes available. A source that dries up early is an
/// error, not a short success: silent truncation here would surface as a
/// cryptic installer failure on an end-user machine, far from the bug.
pub fn copy_exact<R: Read + ?Sized, W: Write + ?Sized>(
    source: &mut R,
    dest: &mut W,
    length: u64,
) -> Result<()> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE.min(length.max(1) as usize)];
    let mut remaining = length;

    while remaining > 0 {
        let want = buffer.len().min(remaining as usize);
        let got = source.read(&mut buffer[..want])?;
        if got == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended {remaining} bytes short of the recorded length {length}"
                ),
            )));
        }
        dest.write_all(&buffer[..got])?;
        remaining -= got as u64;
    }

    Ok(())
}

/// Create `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).fs_context("creating directory", dir)
}

/// Reset permissions on an output file so downstream tools (signers,
/// installers) can open it regardless of what the input's permissions were.
pub fn reset_acl(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).fs_context("reading metadata of", path)?;
    let mut permissions = metadata.permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(0o644);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
    }

    fs::set_permissions(path, permissions).fs_context("resetting permissions on", path)
}

/// Replace `dest` with `temp`, deleting any pre-existing file first.
///
/// The rename is the visibility point: until it happens, only the temp file
/// can be partially written, so a crash mid-operation never leaves a
/// half-written file at the well-known output path.
pub fn replace_file(temp: tempfile::NamedTempFile, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    if dest.exists() {
        fs::remove_file(dest).fs_context("removing existing file", dest)?;
    }
    temp.persist(dest).map_err(|e| Error::Fs {
        context: "moving temp file to",
        path: dest.to_path_buf(),
        error: e.error,
    })?;
    Ok(())
}
