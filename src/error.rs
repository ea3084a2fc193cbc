use std::io;
use std::path::PathBuf;

use tokio::task::JoinError;

/// The primary error type for all operations in the `pkgsize` crate.
#[derive(Debug, thiserror::Error)]
pub enum PkgSizeError {
    /// The package path does not exist or is not a directory.
    #[error("could not resolve package path '{}': {source}", .path.display())]
    Resolution { path: PathBuf, source: io::Error },

    /// The file lister could not enumerate the package contents,
    /// e.g. because the manifest is missing or malformed.
    #[error("could not list files of package '{}': {reason}", .path.display())]
    Listing { path: PathBuf, reason: String },

    /// An I/O error occurred while reading or compressing a file.
    /// Includes the path where the error happened.
    #[error("I/O error on path '{}': {source}", .path.display())]
    Io { source: io::Error, path: PathBuf },

    /// Invalid caller-supplied options (ignore pattern, size kind, concurrency).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A worker task panicked or was cancelled before producing a result.
    #[error("worker task failed: {0}")]
    Task(#[from] JoinError),
}

impl PkgSizeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PkgSizeError::Io { source, path: path.into() }
    }

    /// The filesystem path the error refers to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            PkgSizeError::Resolution { path, .. }
            | PkgSizeError::Listing { path, .. }
            | PkgSizeError::Io { path, .. } => Some(path),
            PkgSizeError::Config(_) | PkgSizeError::Task(_) => None,
        }
    }
}

pub type Result<T, E = PkgSizeError> = std::result::Result<T, E>;
