//! object_tool entry point.

use std::process;

use clap::{error::ErrorKind, Parser};
use macholib::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    init_logging();

    if let Err(e) = run(&cli) {
        tracing::debug!(error = ?e, "object_tool failed");
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Initialize the tracing subscriber.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("macholib=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
