//! Package file listing.
//!
//! The pipeline asks a [`PackageLister`] which files would ship. The real
//! rules of a publish step (manifest `files`, ignore files, always-included
//! files) live outside this crate; [`WalkLister`] is a plain directory walk
//! that only drops what npm never publishes.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::{PkgSizeError, Result};

pub const MANIFEST: &str = "package.json";

/// Directories that are never part of a published package.
const SKIP_DIRS: &[&str] = &[".git", ".svn", ".hg", "CVS", "node_modules"];

/// Files that are never part of a published package.
const SKIP_FILES: &[&str] = &[".npmrc", ".DS_Store", "npm-debug.log", "package-lock.json"];

/// Enumerates the files of a package.
pub trait PackageLister: Send + Sync {
    /// Paths relative to `root`, `/`-separated, without a leading separator,
    /// free of duplicates and in the order they would be archived.
    fn list(&self, root: &Path) -> Result<Vec<String>>;
}

/// Walks the package directory in file-name order.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkLister;

impl PackageLister for WalkLister {
    fn list(&self, root: &Path) -> Result<Vec<String>> {
        check_manifest(root)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e));
        for entry in walker {
            let entry = entry.map_err(|e| listing(root, format!("walk failed: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if SKIP_FILES.iter().any(|skip| entry.file_name() == *skip) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| {
                    listing(root, format!("'{}' is outside the package", entry.path().display()))
                })?;
            files.push(to_slash(relative));
        }

        debug!(root = %root.display(), files = files.len(), "listed package files");
        Ok(files)
    }
}

fn check_manifest(root: &Path) -> Result<()> {
    let text = fs::read_to_string(root.join(MANIFEST))
        .map_err(|e| listing(root, format!("cannot read {MANIFEST}: {e}")))?;
    let manifest: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| listing(root, format!("malformed {MANIFEST}: {e}")))?;
    if !manifest.is_object() {
        return Err(listing(root, format!("{MANIFEST} must contain a JSON object")));
    }
    Ok(())
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && SKIP_DIRS.iter().any(|skip| entry.file_name() == *skip)
}

fn to_slash(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn listing(root: &Path, reason: String) -> PkgSizeError {
    PkgSizeError::Listing {
        path: root.to_path_buf(),
        reason,
    }
}
