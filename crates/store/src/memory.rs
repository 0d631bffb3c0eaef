use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use pulse_protocol::{Batch, BatchStore, StoreError};

/// In-process store. Contents are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Mutex<VecDeque<Batch>>,
    limit: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses new batches once `limit` are held.
    pub fn bounded(limit: usize) -> Self {
        Self {
            batches: Mutex::default(),
            limit: Some(limit),
        }
    }

    pub fn len(&self) -> usize {
        self.batches().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches().is_empty()
    }

    fn batches(&self) -> MutexGuard<'_, VecDeque<Batch>> {
        self.batches.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BatchStore for MemoryStore {
    fn store(&self, batch: Batch) -> Result<(), StoreError> {
        let mut batches = self.batches();
        if let Some(limit) = self.limit
            && batches.len() >= limit
        {
            return Err(StoreError::Full { capacity: limit });
        }
        batches.push_back(batch);
        Ok(())
    }

    fn drain_stored(&self) -> Result<Vec<Batch>, StoreError> {
        Ok(self.batches().drain(..).collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
