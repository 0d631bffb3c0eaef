pub mod drain;
pub mod ingest;
pub mod status;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use clap::Subcommand;
use pulse_store::DiskStore;

pub use drain::DrainArgs;
pub use ingest::IngestArgs;
pub use status::StatusArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read NDJSON events from stdin and deliver them in batches.
    ///
    /// Example:
    ///   tail -f events.ndjson | pulse ingest --profile strict
    ///   pulse ingest -o /var/spool/pulse < events.ndjson
    Ingest(IngestArgs),

    /// Print and remove batches that could not be delivered.
    Drain(DrainArgs),

    /// Show the store location and how many batches are waiting.
    Status(StatusArgs),
}

/// Opens `dir`, or the default store location when none is given.
pub(crate) fn open_store(dir: Option<&Path>) -> Result<Arc<DiskStore>> {
    let store = match dir {
        Some(dir) => DiskStore::open(dir)
            .with_context(|| format!("failed to open store at {}", dir.display()))?,
        None => DiskStore::open_default().context("failed to open default store")?,
    };
    Ok(Arc::new(store))
}
