//! # pkgsize Core Library
//!
//! This crate reports which files a package would publish, how large each one
//! is raw, gzipped and brotli-compressed, and how large the compressed tarball
//! would be.
//!
//! It is designed to be used by the `pkgsize` command-line application, but its
//! public API can also be used programmatically.
//!
//! ## Key Modules
//!
//! - [`pkg_size`]: The pipeline entry point, [`compute_package_size`].
//! - [`metrics`]: Per-file raw/gzip/brotli measurement.
//! - [`archive`]: Compressed tarball size for an exact file list.
//! - [`workers`]: Bounded, order-preserving task scheduler.
//! - [`compress`]: Streaming byte counters.
//! - [`lister`] and [`fsx`]: Ports for file listing and file reading.
//!
//! ## Examples
//!
//! ```no_run
//! use pkgsize::{compute_package_size, PkgSizeOptions, SizeKind};
//!
//! # async fn demo() -> Result<(), pkgsize::PkgSizeError> {
//! let options = PkgSizeOptions::default().with_sizes([SizeKind::Gzip]);
//! let report = compute_package_size(Some(std::path::Path::new("./my-package")), &options).await?;
//! println!("tarball: {} bytes", report.tarball_size);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cli;
pub mod cli_runner;
pub mod common;
pub mod compress;
pub mod error;
pub mod fsx;
pub mod lister;
pub mod metrics;
pub mod options;
pub mod pkg_size;
pub mod workers;

pub use common::{FileEntry, PackageSizeReport, SizeKind};
pub use error::{PkgSizeError, Result};
pub use options::PkgSizeOptions;
pub use pkg_size::{compute_package_size, PkgSize};
