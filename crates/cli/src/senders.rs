//! Local batch senders used by the `ingest` command.

use std::{
    fs,
    io::{self, Stdout, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use pulse_protocol::{Batch, BatchSender, SendError};
use tempfile::NamedTempFile;

/// Writes each batch payload as one line.
pub struct LineSender<W> {
    out: Mutex<W>,
}

impl LineSender<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> LineSender<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> BatchSender for LineSender<W> {
    fn send(&self, batch: &Batch) -> Result<(), SendError> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        out.write_all(batch.payload())?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// Drops each batch as a `.json` file into an outbox directory for another
/// process to pick up. Unavailable while the directory is missing.
pub struct DirSender {
    dir: PathBuf,
}

impl DirSender {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(batch: &Batch) -> String {
        format!(
            "{}-{}-{:06}.json",
            batch.created_at().format("%Y%m%dT%H%M%S%.3fZ"),
            std::process::id(),
            batch.sequence()
        )
    }
}

impl BatchSender for DirSender {
    fn send(&self, batch: &Batch) -> Result<(), SendError> {
        let tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.as_file().write_all(batch.payload())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(Self::file_name(batch)))
            .map_err(|e| e.error)?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

#[cfg(test)]
#[path = "senders_tests.rs"]
mod tests;
