use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use log::{debug, warn};
use pulse_protocol::{
    Batch, BatchStore, StoreError,
    codec::{self, CodecError},
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// Batches kept on disk before `store` starts refusing new ones.
pub const DEFAULT_LIMIT: usize = 100;

pub const STORE_VERSION: u32 = 1;

const BATCH_EXT: &str = "batch";

/// On-disk envelope around a batch payload.
#[derive(Debug, Serialize, Deserialize)]
struct StoredBatch {
    version: u32,
    sequence: u64,
    item_count: u64,
    created_at: DateTime<Utc>,
    /// crc32 of `payload`
    checksum: u32,
    payload: Vec<u8>,
}

impl StoredBatch {
    fn wrap(batch: &Batch) -> Self {
        Self {
            version: STORE_VERSION,
            sequence: batch.sequence(),
            item_count: batch.item_count() as u64,
            created_at: batch.created_at(),
            checksum: checksum(batch.payload()),
            payload: batch.payload().to_vec(),
        }
    }

    fn unwrap_checked(self) -> Result<Batch, StoreError> {
        if self.version != STORE_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported store version {}",
                self.version
            )));
        }
        let actual = checksum(&self.payload);
        if actual != self.checksum {
            return Err(StoreError::Corrupt(format!(
                "checksum mismatch: expected {:08x}, got {actual:08x}",
                self.checksum
            )));
        }
        Ok(Batch::new(
            self.sequence,
            self.item_count as usize,
            self.created_at,
            self.payload,
        ))
    }
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// One file per batch under a directory, written atomically.
///
/// File names start with a zero-padded millisecond timestamp, so sorting
/// names gives oldest first.
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
    limit: usize,
    counter: AtomicU64,
    lock: Mutex<()>,
}

impl DiskStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_limit(dir, DEFAULT_LIMIT)
    }

    pub fn with_limit(dir: impl Into<PathBuf>, limit: usize) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("disk store at {}", dir.display());
        Ok(Self {
            dir,
            limit: limit.max(1),
            counter: AtomicU64::new(0),
            lock: Mutex::new(()),
        })
    }

    /// Store under the user's state directory, or `PULSE_STORE_DIR`.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(pulse_runtime::default_store_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of batches currently on disk.
    pub fn pending(&self) -> Result<usize, StoreError> {
        Ok(self.batch_files()?.len())
    }

    /// Stored batch files, oldest first.
    fn batch_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == BATCH_EXT) && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn next_file_name(&self, batch: &Batch) -> String {
        let millis = batch.created_at().timestamp_millis().max(0);
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!(
            "{millis:013}-{n:06}-{pid}.{BATCH_EXT}",
            pid = std::process::id()
        )
    }

    fn write_atomic(&self, path: &Path, batch: &Batch) -> Result<(), StoreError> {
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            codec::write_message(&mut writer, &StoredBatch::wrap(batch))
                .map_err(codec_to_store)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        #[cfg(unix)]
        {
            if let Ok(dir) = File::open(&self.dir) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }

    fn read_batch(path: &Path) -> Result<Batch, StoreError> {
        let mut reader = BufReader::new(File::open(path)?);
        let stored: StoredBatch = codec::read_message(&mut reader).map_err(codec_to_store)?;
        stored.unwrap_checked()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A short read is a truncated file, not an I/O failure.
fn codec_to_store(err: CodecError) -> StoreError {
    match err {
        CodecError::Io(e) if e.kind() != io::ErrorKind::UnexpectedEof => StoreError::Io(e),
        other => StoreError::Corrupt(other.to_string()),
    }
}

impl BatchStore for DiskStore {
    fn store(&self, batch: Batch) -> Result<(), StoreError> {
        let _guard = self.lock();

        if self.batch_files()?.len() >= self.limit {
            return Err(StoreError::Full {
                capacity: self.limit,
            });
        }

        let path = self.dir.join(self.next_file_name(&batch));
        self.write_atomic(&path, &batch)?;
        debug!(
            "stored batch {} ({} events) at {}",
            batch.sequence(),
            batch.item_count(),
            path.display()
        );
        Ok(())
    }

    /// Reads every stored batch, then removes the files. Corrupt files are
    /// removed and skipped. Nothing is removed if a file cannot be read.
    fn drain_stored(&self) -> Result<Vec<Batch>, StoreError> {
        let _guard = self.lock();

        let files = self.batch_files()?;
        let mut batches = Vec::with_capacity(files.len());
        for path in &files {
            match Self::read_batch(path) {
                Ok(batch) => batches.push(batch),
                Err(StoreError::Corrupt(reason)) => {
                    warn!("discarding corrupt batch {}: {reason}", path.display());
                }
                Err(e) => return Err(e),
            }
        }

        for path in &files {
            if let Err(e) = fs::remove_file(path)
                && e.kind() != io::ErrorKind::NotFound
            {
                warn!("failed to remove {}: {e}", path.display());
            }
        }

        debug!(
            "drained {} batches from {}",
            batches.len(),
            self.dir.display()
        );
        Ok(batches)
    }
}

#[cfg(test)]
#[path = "disk_tests.rs"]
mod tests;
