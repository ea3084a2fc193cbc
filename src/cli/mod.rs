use clap::Parser;
use std::path::PathBuf;

use crate::common::SizeKind;
use crate::options::PkgSizeOptions;
use crate::workers::DEFAULT_CONCURRENCY;

/// Environment variable consulted when `--concurrency` is not given.
pub const CONCURRENCY_ENV: &str = "PKG_SIZE_CONCURRENCY";

/// Report the files a package would publish and how large they are.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Package directory to measure. Defaults to the current directory.
    pub pkg_path: Option<PathBuf>,

    /// Per-file sizes to compute, comma separated.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = SizeKind::ALL.to_vec())]
    pub sizes: Vec<SizeKind>,

    /// Glob of files to leave out of the report and of the tarball size.
    #[arg(short, long, value_name = "GLOB")]
    pub ignore_files: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Maximum number of files measured at once. Falls back to PKG_SIZE_CONCURRENCY, then 10.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl Args {
    /// Builds pipeline options from the parsed flags and the environment.
    pub fn to_options(&self) -> Result<PkgSizeOptions, Box<dyn std::error::Error>> {
        let mut options = PkgSizeOptions::default()
            .with_sizes(self.sizes.iter().copied())
            .with_concurrency(get_concurrency_from_opt_or_env(self.concurrency)?);
        if let Some(pattern) = &self.ignore_files {
            options = options.with_ignore_files(pattern.clone());
        }
        Ok(options)
    }
}

/// Gets the concurrency limit from the command-line option, the `PKG_SIZE_CONCURRENCY`
/// environment variable, or the default.
///
/// Priority:
/// 1. `--concurrency` command-line argument.
/// 2. `PKG_SIZE_CONCURRENCY` environment variable.
/// 3. [`DEFAULT_CONCURRENCY`].
pub fn get_concurrency_from_opt_or_env(
    opt: Option<usize>,
) -> Result<usize, Box<dyn std::error::Error>> {
    if let Some(limit) = opt {
        return Ok(limit);
    }
    match std::env::var(CONCURRENCY_ENV) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("{CONCURRENCY_ENV}='{raw}' is not a valid number: {e}").into()),
        Err(_) => Ok(DEFAULT_CONCURRENCY),
    }
}

/// Parses command-line arguments using `clap`.
///
/// Exits the process on `--help`, `--version` and invalid flags.
pub fn run() -> Args {
    Args::parse()
}
