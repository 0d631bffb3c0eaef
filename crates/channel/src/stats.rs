use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters. Drops are expected under overload and are counted
/// here rather than logged as errors.
#[derive(Debug, Default)]
pub(crate) struct ChannelStats {
    pub(crate) enqueued: AtomicU64,
    pub(crate) dropped_busy: AtomicU64,
    pub(crate) dropped_disabled: AtomicU64,
    pub(crate) dropped_malformed: AtomicU64,
    pub(crate) flushes: AtomicU64,
    pub(crate) batches_sent: AtomicU64,
    pub(crate) batches_stored: AtomicU64,
    pub(crate) batches_lost: AtomicU64,
    pub(crate) batches_replayed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub dropped_busy: u64,
    pub dropped_disabled: u64,
    pub dropped_malformed: u64,
    pub flushes: u64,
    pub batches_sent: u64,
    pub batches_stored: u64,
    pub batches_lost: u64,
    pub batches_replayed: u64,
}

impl StatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.dropped_busy + self.dropped_disabled + self.dropped_malformed
    }
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl ChannelStats {
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            enqueued: load(&self.enqueued),
            dropped_busy: load(&self.dropped_busy),
            dropped_disabled: load(&self.dropped_disabled),
            dropped_malformed: load(&self.dropped_malformed),
            flushes: load(&self.flushes),
            batches_sent: load(&self.batches_sent),
            batches_stored: load(&self.batches_stored),
            batches_lost: load(&self.batches_lost),
            batches_replayed: load(&self.batches_replayed),
        }
    }
}
