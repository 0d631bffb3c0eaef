use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Args;
use log::error;
use pulse_protocol::BatchStore;

use crate::commands::open_store;

#[derive(Debug, Args)]
pub struct DrainArgs {
    /// Store directory (defaults to the state directory)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Remove stored batches without printing them
    #[arg(long)]
    pub discard: bool,
}

pub fn run(args: DrainArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[drain] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: DrainArgs) -> Result<ExitCode> {
    let store = open_store(args.store_dir.as_deref())?;
    let batches = store.drain_stored().context("failed to read stored batches")?;

    if batches.is_empty() {
        eprintln!("[drain] nothing stored in {}", store.dir().display());
        return Ok(ExitCode::SUCCESS);
    }

    let events: usize = batches.iter().map(|b| b.item_count()).sum();
    if !args.discard {
        let mut out = io::stdout().lock();
        for batch in &batches {
            out.write_all(batch.payload())?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }

    eprintln!(
        "[drain] {} {} batches ({events} events) from {}",
        if args.discard { "discarded" } else { "drained" },
        batches.len(),
        store.dir().display()
    );
    Ok(ExitCode::SUCCESS)
}
