//! # Tarball Size Estimation
//!
//! Builds the archive a publish step would produce for an exact file list and
//! measures its gzip-compressed length. The tar stream is written straight
//! into a gzip encoder whose output only feeds a byte counter, so neither the
//! archive nor its compressed form is ever held in memory.
//!
//! The result is a real measurement of one shared-dictionary stream; it is not
//! the sum of per-file compressed sizes.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tar::{Builder, EntryType, Header};
use tokio::task;
use tracing::{debug, info};

use crate::compress::{self, Cancellable};
use crate::fsx::{self, SourceReader};
use crate::workers::CancelFlag;
use crate::{PkgSizeError, Result};

/// Top-level directory every entry is placed under, as `npm pack` does.
pub const ARCHIVE_PREFIX: &str = "package";

/// Fixed entry mtime (1985-10-26T08:15:00Z), the timestamp npm stamps on
/// packed files so tarballs are reproducible.
pub const ARCHIVE_MTIME: u64 = 499_162_500;

/// Archive entry name for a lister-relative path.
pub fn entry_name(relative: &str) -> String {
    format!("{ARCHIVE_PREFIX}/{}", relative.trim_start_matches('/'))
}

/// Gzip-compressed size of the tarball holding exactly `files`, rooted at
/// `pkg_path`, in the given order.
///
/// The caller's list is copied before archiving and never modified. Archiving
/// stops at the next read once `cancel` is set.
pub async fn estimate_archive_size(
    source: Arc<dyn SourceReader>,
    pkg_path: Arc<Path>,
    files: &[String],
    cancel: &CancelFlag,
) -> Result<u64> {
    let files: Vec<String> = files.to_vec();
    let count = files.len();
    let cancel = cancel.clone();
    let size = task::spawn_blocking(move || {
        write_tarball(source.as_ref(), &pkg_path, &files, &cancel)
    })
    .await??;
    info!(files = count, tarball_size = size, "measured tarball");
    Ok(size)
}

fn write_tarball(
    source: &dyn SourceReader,
    root: &Path,
    files: &[String],
    cancel: &CancelFlag,
) -> Result<u64> {
    let mut builder = Builder::new(compress::gzip_counter());

    for relative in files {
        let absolute: PathBuf = fsx::resolve(root, relative);
        cancel.check().map_err(|e| PkgSizeError::io(&absolute, e))?;
        let file = source.open(root, relative).map_err(|e| PkgSizeError::io(&absolute, e))?;

        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_size(file.len);
        header.set_mode(normalize_mode(file.mode));
        header.set_mtime(ARCHIVE_MTIME);
        header.set_uid(0);
        header.set_gid(0);

        let data = ExactLen::new(Cancellable::new(file.reader, cancel.clone()), file.len);
        builder
            .append_data(&mut header, entry_name(relative), data)
            .map_err(|e| PkgSizeError::io(&absolute, e))?;
        debug!(path = %relative, len = file.len, "appended to tarball");
    }

    let encoder = builder.into_inner().map_err(|e| PkgSizeError::io(root, e))?;
    let sink = encoder.finish().map_err(|e| PkgSizeError::io(root, e))?;
    Ok(sink.bytes())
}

/// Yields exactly `len` bytes: later bytes are ignored, and running dry
/// early is an `UnexpectedEof` error. The header was written with `len`, so
/// any other body length would corrupt the stream.
struct ExactLen<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ExactLen<R> {
    fn new(inner: R, len: u64) -> Self {
        Self { inner, remaining: len }
    }
}

impl<R: Read> Read for ExactLen<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let cap = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..cap])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended {} bytes short of its recorded length", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Executable files ship as 0755, everything else as 0644.
fn normalize_mode(mode: u32) -> u32 {
    if mode & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}
