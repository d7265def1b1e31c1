// Standard library
use std::process::ExitCode;

// External crates
use clap::Parser;
use tracing::debug;

// Internal imports
use drsnap_core::snap_error;
use drsnap_logging::{init_subscriber, LogSettings};

// Local modules
mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut settings = LogSettings::from_env();
    if args.debug {
        settings = settings.with_level("debug");
    }
    // Dropping the guard flushes file output.
    let _log_guard = init_subscriber(&settings);

    debug!(command = ?args.command, "Starting drsnap");

    match execute_command(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            snap_error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
