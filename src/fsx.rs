//! Filesystem reader used by the pipeline.
//!
//! Every file the pipeline touches is opened through [`SourceReader`], so
//! tests can swap in readers that count handles, add latency or fail for a
//! given path. [`LocalFs`] is the real implementation on top of `std::fs`.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// An opened package file, ready to be streamed once.
pub struct SourceFile {
    pub reader: Box<dyn Read + Send>,
    /// Length in bytes as reported by the file's metadata.
    pub len: u64,
    /// POSIX permission bits.
    pub mode: u32,
}

/// Opens package files for streaming reads.
pub trait SourceReader: Send + Sync {
    fn open(&self, root: &Path, relative: &str) -> io::Result<SourceFile>;
}

/// Reads files straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl SourceReader for LocalFs {
    fn open(&self, root: &Path, relative: &str) -> io::Result<SourceFile> {
        let file = File::open(resolve(root, relative))?;
        let meta = file.metadata()?;
        Ok(SourceFile {
            len: meta.len(),
            mode: mode_of(&meta),
            reader: Box::new(file),
        })
    }
}

/// Joins a lister-relative path onto the package root.
pub fn resolve(root: &Path, relative: &str) -> PathBuf {
    root.join(relative.trim_start_matches('/'))
}

#[cfg(unix)]
fn mode_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(_meta: &std::fs::Metadata) -> u32 {
    0o644
}
