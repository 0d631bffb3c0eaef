use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::Args;
use log::error;
use pulse_channel::ChannelConfig;

use crate::commands::open_store;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Store directory (defaults to the state directory)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,
}

pub fn run(args: StatusArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[status] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: StatusArgs) -> Result<ExitCode> {
    let store = open_store(args.store_dir.as_deref())?;
    let pending = store.pending()?;
    let config = ChannelConfig::from_env();

    println!("store:      {}", store.dir().display());
    println!("pending:    {pending} / {} batches", store.limit());
    println!("enabled:    {}", config.enabled);
    println!("batch size: {}", config.max_batch_size);
    println!("interval:   {}s", config.batch_interval_secs);

    // Non-zero when something is waiting, for use in scripts.
    if pending > 0 {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
