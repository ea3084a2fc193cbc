//! Options accepted by the size pipeline.

use globset::{Glob, GlobMatcher};

use crate::common::SizeKind;
use crate::workers::DEFAULT_CONCURRENCY;
use crate::{PkgSizeError, Result};

/// Holds all configuration options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgSizeOptions {
    /// Metrics to compute per file. May be empty when only the tarball size matters.
    pub sizes: Vec<SizeKind>,
    /// Shell glob; matching files are dropped from both the file list and the tarball.
    pub ignore_files: Option<String>,
    /// Maximum number of tasks (tarball + files) in flight at once.
    pub concurrency: usize,
}

impl Default for PkgSizeOptions {
    fn default() -> Self {
        Self {
            sizes: SizeKind::ALL.to_vec(),
            ignore_files: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl PkgSizeOptions {
    pub fn with_sizes(mut self, sizes: impl IntoIterator<Item = SizeKind>) -> Self {
        self.sizes = sizes.into_iter().collect();
        self
    }

    pub fn with_ignore_files(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_files = Some(pattern.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Checks the options and compiles the ignore pattern.
    pub fn validate(&self) -> Result<ValidatedOptions> {
        if self.concurrency == 0 {
            return Err(PkgSizeError::Config("concurrency must be at least 1".into()));
        }
        let ignore = self.ignore_files.as_deref().map(IgnoreFilter::new).transpose()?;

        let mut sizes = Vec::with_capacity(self.sizes.len());
        for &kind in &self.sizes {
            if !sizes.contains(&kind) {
                sizes.push(kind);
            }
        }
        Ok(ValidatedOptions { sizes, ignore, concurrency: self.concurrency })
    }
}

/// Options that passed [`PkgSizeOptions::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedOptions {
    pub sizes: Vec<SizeKind>,
    pub ignore: Option<IgnoreFilter>,
    pub concurrency: usize,
}

/// Compiled `--ignore-files` glob, tested against sanitized entry paths
/// such as `/test/c.js`.
///
/// `*` also matches `/`, and a leading `**/` matches any prefix.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    pattern: String,
    matcher: GlobMatcher,
}

impl IgnoreFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(PkgSizeError::Config("ignore pattern must not be empty".into()));
        }
        let glob = Glob::new(pattern)
            .map_err(|e| PkgSizeError::Config(format!("invalid ignore pattern '{pattern}': {e}")))?;
        Ok(Self {
            pattern: pattern.to_owned(),
            matcher: glob.compile_matcher(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_ignored(&self, entry_path: &str) -> bool {
        self.matcher.is_match(entry_path)
    }
}
