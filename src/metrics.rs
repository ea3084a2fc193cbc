//! Per-file metric computation.
//!
//! One file is fanned out to one counter per requested [`SizeKind`]. Every
//! counter opens its own reader, so a slow brotli pass never holds up the raw
//! byte count and no stream cursor is shared.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task;
use tracing::debug;

use crate::common::{FileEntry, SizeKind};
use crate::compress::{self, Cancellable};
use crate::fsx::{self, SourceReader};
use crate::workers::CancelFlag;
use crate::{PkgSizeError, Result};

/// Measures one file for each requested size kind.
///
/// `relative` is the lister path used to open the file. `entry_path` is stored
/// verbatim in the returned [`FileEntry`]; any normalization is the caller's
/// job. Kinds that were not requested stay `None`, and an empty `kinds` list
/// opens nothing at all. Counters stop at their next read once `cancel` is
/// set.
pub async fn compute_file_metrics(
    source: Arc<dyn SourceReader>,
    pkg_path: Arc<Path>,
    relative: &str,
    entry_path: &str,
    kinds: &[SizeKind],
    cancel: &CancelFlag,
) -> Result<FileEntry> {
    let mut entry = FileEntry::new(entry_path);
    let mut requested: Vec<SizeKind> = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        if !requested.contains(&kind) {
            requested.push(kind);
        }
    }

    let handles: Vec<_> = requested
        .iter()
        .map(|&kind| {
            let source = Arc::clone(&source);
            let root = Arc::clone(&pkg_path);
            let relative = relative.to_owned();
            let cancel = cancel.clone();
            task::spawn_blocking(move || {
                measure(source.as_ref(), &root, &relative, kind, &cancel)
            })
        })
        .collect();

    // Await every counter before reporting a failure so no reader outlives
    // this task.
    let mut first_error: Option<PkgSizeError> = None;
    for (kind, handle) in requested.iter().copied().zip(handles) {
        match handle.await {
            Ok(Ok(value)) => entry.record(kind, value),
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(join_err) => {
                first_error.get_or_insert(PkgSizeError::from(join_err));
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    debug!(
        path = %entry.path,
        size = ?entry.size,
        gzip = ?entry.size_gzip,
        brotli = ?entry.size_brotli,
        "measured file"
    );
    Ok(entry)
}

fn measure(
    source: &dyn SourceReader,
    root: &Path,
    relative: &str,
    kind: SizeKind,
    cancel: &CancelFlag,
) -> Result<u64> {
    let absolute: PathBuf = fsx::resolve(root, relative);
    let file = source.open(root, relative).map_err(|e| PkgSizeError::io(&absolute, e))?;
    let reader = Cancellable::new(file.reader, cancel.clone());
    compress::count(kind, reader).map_err(|e| PkgSizeError::io(&absolute, e))
}
