use chrono::{DateTime, Utc};

/// Payload of a batch that holds no events.
pub const EMPTY_PAYLOAD: &[u8] = b"[]";

/// A closed JSON array of serialized events, ready for delivery.
///
/// Produced by a flush; once handed to a sender or store it is no longer
/// referenced by the channel that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Monotonic per-channel flush counter.
    sequence: u64,
    item_count: usize,
    created_at: DateTime<Utc>,
    payload: Vec<u8>,
}

impl Batch {
    pub fn new(
        sequence: u64,
        item_count: usize,
        created_at: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            sequence,
            item_count,
            created_at,
            payload,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The JSON array body, `[{...},{...}]`.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Parses the payload back into its individual events.
    pub fn events(&self) -> serde_json::Result<Vec<serde_json::Value>> {
        serde_json::from_slice(&self.payload)
    }
}
