use chrono::{DateTime, Utc};
use pulse_protocol::Batch;

const OPEN: u8 = b'[';
const SEPARATOR: u8 = b',';
const CLOSE: u8 = b']';

/// Growable JSON array body.
///
/// The buffer always holds `[` followed by zero or more comma-separated
/// fragments, so appending `]` yields a valid JSON array at any point.
/// Callers serialize access; the channel keeps this behind its writer lock.
#[derive(Debug)]
pub struct Accumulator {
    buf: Vec<u8>,
    count: usize,
    capacity_hint: usize,
}

impl Accumulator {
    pub fn new(capacity_hint: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity_hint.max(2));
        buf.push(OPEN);
        Self {
            buf,
            count: 0,
            capacity_hint,
        }
    }

    /// Appends one serialized JSON value.
    pub fn append(&mut self, fragment: &[u8]) {
        if self.count > 0 {
            self.buf.push(SEPARATOR);
        }
        self.buf.extend_from_slice(fragment);
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes currently buffered, including the opening bracket.
    #[cfg(test)]
    pub(crate) fn byte_len(&self) -> usize {
        self.buf.len()
    }

    /// The open array body, without the closing bracket.
    #[cfg(test)]
    pub(crate) fn open_prefix(&self) -> &[u8] {
        &self.buf
    }

    /// Closes the current array into a [`Batch`] and starts a new empty one.
    ///
    /// The returned batch owns the bytes; nothing is shared with the next
    /// accumulation period.
    pub fn snapshot_and_reset(&mut self, sequence: u64, created_at: DateTime<Utc>) -> Batch {
        // Keep roughly the size of the last batch for the next one.
        let next_capacity = self.buf.len().max(self.capacity_hint).max(2);
        let mut fresh = Vec::with_capacity(next_capacity);
        fresh.push(OPEN);

        let mut payload = std::mem::replace(&mut self.buf, fresh);
        payload.push(CLOSE);
        let count = std::mem::take(&mut self.count);

        Batch::new(sequence, count, created_at, payload)
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new(4 * 1024)
    }
}

#[cfg(test)]
#[path = "accumulator_tests.rs"]
mod tests;
