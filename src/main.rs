//! CLI entry point for the reporting assistant.

use corep_assistant::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    // WARN by default, respecting RUST_LOG; `log` records from the library are bridged.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    if let Err(e) = cli::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
