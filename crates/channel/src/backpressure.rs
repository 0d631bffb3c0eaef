//! Broadcast of the channel's transition into the blocked state.
//!
//! Listeners run on the thread that initiated the flush, after the writer
//! lock has been released, so they may call back into the channel. They
//! must not block: a slow listener delays the producer that filled the batch.
//! A panicking listener is logged and skipped.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::error;

/// The only payload of the signal: the channel became blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBlocked;

pub trait BackpressureListener: Send + Sync {
    fn on_blocked(&self, signal: ChannelBlocked);
}

impl<F> BackpressureListener for F
where
    F: Fn(ChannelBlocked) + Send + Sync,
{
    fn on_blocked(&self, signal: ChannelBlocked) {
        self(signal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Forwards signals into a crossbeam channel. Bounded to one slot, so a
/// subscriber that has not yet consumed a signal sees the next one coalesced.
struct ChannelListener {
    tx: Sender<ChannelBlocked>,
}

impl BackpressureListener for ChannelListener {
    fn on_blocked(&self, signal: ChannelBlocked) {
        match self.tx.try_send(signal) {
            Ok(()) | Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[derive(Default)]
pub struct Backpressure {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn BackpressureListener>)>>,
    next_id: AtomicU64,
}

impl Backpressure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn BackpressureListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    /// Subscribe through a receiver instead of a callback.
    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<ChannelBlocked>) {
        let (tx, rx) = channel::bounded(1);
        let id = self.subscribe(Arc::new(ChannelListener { tx }));
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub(crate) fn notify(&self) {
        // Clone out so listeners may subscribe or unsubscribe from a callback.
        let listeners: Vec<Arc<dyn BackpressureListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| listener.on_blocked(ChannelBlocked)));
            if delivered.is_err() {
                error!("backpressure listener panicked");
            }
        }
    }
}

#[cfg(test)]
#[path = "backpressure_tests.rs"]
mod tests;
