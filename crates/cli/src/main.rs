use std::process::ExitCode;

use clap::Parser;

mod commands;
mod senders;

use commands::Command;
use pulse_runtime::logging;

#[derive(Debug, Parser)]
#[command(
    name = "pulse",
    version,
    about = "Batch NDJSON telemetry events for delivery",
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Ingest(args) => commands::ingest::run(args),
        Command::Drain(args) => commands::drain::run(args),
        Command::Status(args) => commands::status::run(args),
    }
}
