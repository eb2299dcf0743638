//! Errors reported by the archiver.
//!
//! Every variant names the path it is about so that front-ends can print a
//! useful message without extra bookkeeping. I/O failures keep the
//! underlying error as their `source()`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for archiver operations.
pub type ArchiverResult<T> = Result<T, ArchiverError>;

/// Failures of the backup and archive operations.
#[derive(Debug, Error)]
pub enum ArchiverError {
    /// The source path does not exist.
    #[error("source directory not found: {}", path.display())]
    SourceNotFound {
        /// Path as given by the caller.
        path: PathBuf,
    },
    /// The source path exists but is not a directory.
    #[error("source is not a directory: {}", path.display())]
    SourceNotDirectory {
        /// Path as given by the caller.
        path: PathBuf,
    },
    /// The source resolves to a path without a final component, such as `/`.
    #[error("source directory has no name to derive outputs from: {}", path.display())]
    SourceUnnamed {
        /// Canonical source path.
        path: PathBuf,
    },
    /// A destination directory is absent, not a directory, or not writable.
    #[error("destination {} is unusable ({reason})", path.display())]
    DestinationMissingOrUnwritable {
        /// Destination directory.
        path: PathBuf,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// The output already exists and must not be replaced.
    #[error("destination already exists: {}", path.display())]
    DestinationCollision {
        /// Output path that already exists.
        path: PathBuf,
    },
    /// I/O failure while duplicating the tree.
    #[error("copy failed during {operation} at {}: {source}", path.display())]
    CopyFailure {
        /// Step that failed.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// I/O or zip failure while producing the archive.
    #[error("compression failed during {operation} at {}: {source}", path.display())]
    CompressionFailure {
        /// Step that failed.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A skip pattern could not be compiled.
    #[error("invalid skip pattern '{pattern}'")]
    InvalidSkipPattern {
        /// Pattern as given by the caller.
        pattern: String,
        /// Underlying glob error.
        source: glob::PatternError,
    },
}

impl ArchiverError {
    pub(crate) fn copy(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CopyFailure {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn compression(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::CompressionFailure {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: async_zip::error::ZipError,
    ) -> Self {
        Self::compression(operation, path, io::Error::other(source))
    }

    pub(crate) fn unusable_destination(path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::DestinationMissingOrUnwritable {
            path: path.into(),
            reason,
        }
    }
}
