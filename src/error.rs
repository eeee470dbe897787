//! Error types for bundle container operations.
//!
//! Provides contextual error chaining, filesystem-specific errors with path
//! context, and the typed failures the reader/writer layer reports: a file
//! that is not a bundle, a region copy that came up short, or a container
//! the archive codec could not unpack.
//!
//! # Features
//!
//! - **Context trait**: Add context to errors similar to anyhow
//! - **ErrorExt trait**: Filesystem operations with automatic path context
//! - **bail! macro**: Early return with formatted error messages

use std::{
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Errors returned by bundle container operations.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Automatically includes the path that caused the error for better
    /// diagnostics. Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading bundle file")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// The file is not a Burn bundle: the stamp section is missing, the
    /// magic or version is wrong, or the recorded sizes do not fit inside
    /// the actual file.
    #[error("{path} is not a bundle: {reason}")]
    NotABundle {
        /// File that was inspected
        path: PathBuf,
        /// Why the stamp was rejected
        reason: String,
    },

    /// The archive codec failed to unpack a container.
    #[error("failed to extract {container} container: {reason}")]
    ExtractionFailed {
        /// Which container was being unpacked ("UX" or "attached")
        container: &'static str,
        /// Codec error text
        reason: String,
    },

    /// Detach's verified-length check failed. A truncated engine cannot be
    /// signed or later reattached, so no output file is produced.
    #[error("engine copy incomplete: expected {expected} bytes, copied {copied}")]
    EngineCopyIncomplete {
        /// Bytes the stamp said the engine occupies
        expected: u64,
        /// Bytes actually transferred
        copied: u64,
    },

    /// A mutation was attempted while the file still carried a live
    /// Authenticode signature range.
    #[error("cannot append to {path}: signature must be reset before the file is mutated")]
    StaleSignature {
        /// File under mutation
        path: PathBuf,
    },

    /// Generic I/O error. Short reads and writes during a region copy are
    /// reported through this variant as `UnexpectedEof`.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// ZIP archive creation/extraction error.
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error walking a directory while packing a container.
    #[error("{0}")]
    Walkdir(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripPrefix(#[from] path::StripPrefixError),

    /// JSON serialization error (harvest report).
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Generic(String),
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with this crate's [`Error`]
/// type. Works with both `Result<T>` and `Option<T>`.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::Generic(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::Generic(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
///
/// The `context` should be a present-tense verb phrase describing the
/// operation, e.g., "reading bundle file", "creating output directory".
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::Generic`] and returns immediately.
///
/// # Examples
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::error::Error::Generic(format!($msg)))
    };
    ($err:expr $(,)?) => {
        return Err($crate::error::Error::Generic($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::Generic(format!($fmt, $($arg)*)))
    };
}
