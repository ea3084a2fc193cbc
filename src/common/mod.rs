//! Common types shared by the pipeline and its consumers.
// Report structs, size kinds, entry path sanitization.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::PkgSizeError;

/// A per-file metric that can be requested from the pipeline.
#[derive(ValueEnum, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SizeKind {
    /// Raw byte length.
    Size,
    /// Length after gzip compression of the file alone.
    Gzip,
    /// Length after brotli compression of the file alone.
    Brotli,
}

impl SizeKind {
    pub const ALL: [SizeKind; 3] = [SizeKind::Size, SizeKind::Gzip, SizeKind::Brotli];

    /// Name of the matching field in the JSON report.
    pub fn property(self) -> &'static str {
        match self {
            SizeKind::Size => "size",
            SizeKind::Gzip => "sizeGzip",
            SizeKind::Brotli => "sizeBrotli",
        }
    }

    /// Column label used by presentation layers.
    pub fn label(self) -> &'static str {
        match self {
            SizeKind::Size => "Size",
            SizeKind::Gzip => "Gzip",
            SizeKind::Brotli => "Brotli",
        }
    }
}

impl fmt::Display for SizeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SizeKind {
    type Err = PkgSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "size" => Ok(SizeKind::Size),
            "gzip" => Ok(SizeKind::Gzip),
            "brotli" => Ok(SizeKind::Brotli),
            other => Err(PkgSizeError::Config(format!(
                "unknown size kind '{other}' (expected size, gzip or brotli)"
            ))),
        }
    }
}

/// One file that will ship in the package.
///
/// Metrics that were not requested stay `None`, which keeps "not computed"
/// apart from a computed zero.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub size: Option<u64>,
    pub size_gzip: Option<u64>,
    pub size_brotli: Option<u64>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: None,
            size_gzip: None,
            size_brotli: None,
        }
    }

    pub fn get(&self, kind: SizeKind) -> Option<u64> {
        match kind {
            SizeKind::Size => self.size,
            SizeKind::Gzip => self.size_gzip,
            SizeKind::Brotli => self.size_brotli,
        }
    }

    /// Stores a computed metric. Each metric is filled at most once.
    pub fn record(&mut self, kind: SizeKind, value: u64) {
        let slot = match kind {
            SizeKind::Size => &mut self.size,
            SizeKind::Gzip => &mut self.size_gzip,
            SizeKind::Brotli => &mut self.size_brotli,
        };
        debug_assert!(slot.is_none(), "{} recorded twice for {}", kind.property(), self.path);
        *slot = Some(value);
    }
}

/// Result of a full pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageSizeReport {
    pub pkg_path: PathBuf,
    pub tarball_size: u64,
    pub files: Vec<FileEntry>,
}

impl PackageSizeReport {
    /// Sum of one metric over all files that have it, `None` if no file does.
    pub fn total(&self, kind: SizeKind) -> Option<u64> {
        self.files
            .iter()
            .filter_map(|f| f.get(kind))
            .fold(None, |acc, v| Some(acc.unwrap_or(0) + v))
    }
}

/// Replaces the top-level directory of an archive entry name with a single
/// leading `/`, e.g. `package/lib/index.js` becomes `/lib/index.js`.
///
/// Same rule UNPKG applies when serving file metadata.
pub fn sanitize_entry_path(entry_name: &str) -> String {
    let rest = match entry_name.find('/') {
        Some(idx) => &entry_name[idx + 1..],
        None => "",
    };
    format!("/{rest}")
}
