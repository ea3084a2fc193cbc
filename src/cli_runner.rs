//! CLI runner shared by the `pkgsize` binary and the integration tests.
//!
//! Builds the tokio runtime, runs the pipeline and prints the report either as
//! JSON or as plain tab-separated lines with raw byte counts.

use std::io::{self, Write};

use crate::cli::{self, Args};
use crate::common::{PackageSizeReport, SizeKind};
use crate::pkg_size::compute_package_size;

/// Public entry for running CLI logic.
pub fn run_cli_app() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::run();
    run_with_args(&args)
}

pub fn run_with_args(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.to_options()?;
    let columns = options.validate()?.sizes;
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let report = runtime.block_on(compute_package_size(args.pkg_path.as_deref(), &options))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer(&mut out, &report)?;
        writeln!(out)?;
    } else {
        write_plain(&mut out, &report, &columns)?;
    }
    out.flush()?;
    Ok(())
}

/// Plain report: package path, tarball size, then one line per file with the
/// requested sizes in bytes and a closing totals line.
pub fn write_plain<W: Write>(
    out: &mut W,
    report: &PackageSizeReport,
    sizes: &[SizeKind],
) -> io::Result<()> {
    writeln!(out, "Package path\t{}", report.pkg_path.display())?;
    writeln!(out, "Tarball size\t{}", report.tarball_size)?;

    let mut header = String::from("File");
    for kind in sizes {
        header.push('\t');
        header.push_str(kind.label());
    }
    writeln!(out, "{header}")?;

    for file in &report.files {
        let mut line = file.path.clone();
        for &kind in sizes {
            line.push('\t');
            line.push_str(&cell(file.get(kind)));
        }
        writeln!(out, "{line}")?;
    }

    let mut totals = String::from("Total");
    for &kind in sizes {
        totals.push('\t');
        totals.push_str(&cell(report.total(kind)));
    }
    writeln!(out, "{totals}")
}

fn cell(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| v.to_string())
}
