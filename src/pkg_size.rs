//! # Package Size Pipeline
//!
//! Entry point of the library. Resolves the package root, asks the lister for
//! the files that would ship, drops ignored ones, then measures the tarball
//! and every file through one [`BoundedScheduler`] batch and assembles the
//! [`PackageSizeReport`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task;
use tracing::{info, warn};

use crate::archive::{self, estimate_archive_size};
use crate::common::{sanitize_entry_path, FileEntry, PackageSizeReport};
use crate::fsx::{LocalFs, SourceReader};
use crate::lister::{PackageLister, WalkLister};
use crate::metrics::compute_file_metrics;
use crate::options::{IgnoreFilter, PkgSizeOptions};
use crate::workers::{BoundedScheduler, CancelFlag, Task};
use crate::{PkgSizeError, Result};

/// Output of one scheduled unit of work.
enum Measured {
    Tarball(u64),
    File(FileEntry),
}

/// The size pipeline with its two collaborators.
#[derive(Clone)]
pub struct PkgSize {
    lister: Arc<dyn PackageLister>,
    source: Arc<dyn SourceReader>,
}

impl Default for PkgSize {
    fn default() -> Self {
        Self::new(Arc::new(WalkLister), Arc::new(LocalFs))
    }
}

impl PkgSize {
    pub fn new(lister: Arc<dyn PackageLister>, source: Arc<dyn SourceReader>) -> Self {
        Self { lister, source }
    }

    /// Computes the report for the package at `pkg_path`, or the current
    /// directory when `None`.
    pub async fn compute(
        &self,
        pkg_path: Option<&Path>,
        options: &PkgSizeOptions,
    ) -> Result<PackageSizeReport> {
        let options = options.validate()?;
        let root = resolve_package_root(pkg_path)?;

        let lister = Arc::clone(&self.lister);
        let listed_root = root.clone();
        let files = task::spawn_blocking(move || lister.list(&listed_root)).await??;
        let listed = files.len();

        // (lister path, report path) pairs, filtered by the ignore glob.
        let mut entries: Vec<(String, String)> = files
            .into_iter()
            .map(|relative| {
                let entry_path = sanitize_entry_path(&archive::entry_name(&relative));
                (relative, entry_path)
            })
            .collect();
        if let Some(ignore) = &options.ignore {
            entries.retain(|(_, entry_path)| !ignore.is_ignored(entry_path));
        }
        info!(
            pkg = %root.display(),
            listed,
            kept = entries.len(),
            ignore = ?options.ignore.as_ref().map(IgnoreFilter::pattern),
            sizes = ?options.sizes,
            concurrency = options.concurrency,
            "measuring package"
        );

        let root: Arc<Path> = Arc::from(root.as_path());
        let kept: Vec<String> = entries.iter().map(|(relative, _)| relative.clone()).collect();
        let kinds: Arc<[_]> = Arc::from(options.sizes.as_slice());
        let cancel = CancelFlag::default();

        let mut tasks: Vec<Task<Measured, PkgSizeError>> = Vec::with_capacity(entries.len() + 1);
        {
            let source = Arc::clone(&self.source);
            let root = Arc::clone(&root);
            let cancel = cancel.clone();
            tasks.push(Box::pin(async move {
                let size = estimate_archive_size(source, root, &kept, &cancel).await?;
                Ok::<_, PkgSizeError>(Measured::Tarball(size))
            }));
        }
        for (relative, entry_path) in entries {
            let source = Arc::clone(&self.source);
            let root = Arc::clone(&root);
            let kinds = Arc::clone(&kinds);
            let cancel = cancel.clone();
            tasks.push(Box::pin(async move {
                let entry =
                    compute_file_metrics(source, root, &relative, &entry_path, &kinds, &cancel)
                        .await?;
                Ok::<_, PkgSizeError>(Measured::File(entry))
            }));
        }

        let results = BoundedScheduler::new(options.concurrency)
            .with_cancel(cancel)
            .run(tasks)
            .await
            .inspect_err(|err| warn!(error = %err, "package measurement failed"))?;

        // Results come back in submission order: the tarball first, then files.
        let mut tarball_size = 0;
        let mut files: Vec<FileEntry> = Vec::with_capacity(results.len().saturating_sub(1));
        for measured in results {
            match measured {
                Measured::Tarball(size) => tarball_size = size,
                Measured::File(entry) => files.push(entry),
            }
        }

        Ok(PackageSizeReport {
            pkg_path: root.to_path_buf(),
            tarball_size,
            files,
        })
    }
}

/// Computes the report with the default lister and filesystem reader.
pub async fn compute_package_size(
    pkg_path: Option<&Path>,
    options: &PkgSizeOptions,
) -> Result<PackageSizeReport> {
    PkgSize::default().compute(pkg_path, options).await
}

/// Absolute, canonical package root. Must be an existing directory.
pub fn resolve_package_root(pkg_path: Option<&Path>) -> Result<PathBuf> {
    let requested = match pkg_path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().map_err(|source| PkgSizeError::Resolution {
            path: PathBuf::from("."),
            source,
        })?,
    };
    let root = requested
        .canonicalize()
        .map_err(|source| PkgSizeError::Resolution {
            path: requested.clone(),
            source,
        })?;
    if !root.is_dir() {
        return Err(PkgSizeError::Resolution {
            path: root,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        });
    }
    Ok(root)
}
