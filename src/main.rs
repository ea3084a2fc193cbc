//! Main entry point for the pkgsize CLI app

use tracing_subscriber::EnvFilter;

/// Log filter variable, e.g. `PKG_SIZE_LOG=pkgsize=debug`.
const LOG_ENV: &str = "PKG_SIZE_LOG";

fn main() -> std::process::ExitCode {
    init_tracing();

    if let Err(e) = pkgsize::cli_runner::run_cli_app() {
        eprintln!("Error: {}", e);
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
