//! Size and interval flush triggers, plus the clock they read time from.

use std::{
    io,
    sync::Mutex,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use log::debug;
use serde::{Deserialize, Serialize};

/// Source of monotonic time for the interval trigger.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Used to drive interval flushes
/// deterministically.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + *elapsed
    }
}

/// Fires once the batch holds `max` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeTrigger {
    max: usize,
}

impl SizeTrigger {
    pub fn new(max: usize) -> Self {
        Self { max: max.max(1) }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    #[inline]
    pub fn is_reached(&self, count: usize) -> bool {
        count >= self.max
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Armed by the first event after a flush, disarmed by the flush.
    #[default]
    RestartOnFlush,
    /// Fires every period regardless of activity.
    Continuous,
}

/// Wall-clock trigger with a fixed period.
///
/// A period too large to add to an `Instant` leaves the trigger without a
/// deadline, so it never fires.
#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    period: Duration,
    mode: TimerMode,
    deadline: Option<Instant>,
}

impl IntervalTrigger {
    pub fn new(period: Duration, mode: TimerMode, now: Instant) -> Self {
        let deadline = match mode {
            TimerMode::RestartOnFlush => None,
            TimerMode::Continuous => now.checked_add(period),
        };
        Self {
            period,
            mode,
            deadline,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Starts the countdown if it is not already running.
    pub fn arm(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = now.checked_add(self.period);
        }
    }

    /// Called on every flush.
    pub fn reset(&mut self, now: Instant) {
        self.deadline = match self.mode {
            TimerMode::RestartOnFlush => None,
            TimerMode::Continuous => now.checked_add(self.period),
        };
    }

    /// Returns true when the deadline has passed, and reschedules the next
    /// deadline one period from `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = now.checked_add(self.period);
                true
            }
            _ => false,
        }
    }

    /// Changes the period. A running countdown restarts from `now`.
    pub fn set_period(&mut self, period: Duration, now: Instant) {
        self.period = period;
        if self.deadline.is_some() {
            self.deadline = now.checked_add(period);
        }
    }
}

/// Background thread that calls `on_tick` every `poll` until stopped.
pub(crate) struct TimerDriver {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TimerDriver {
    pub(crate) fn spawn<F>(poll: Duration, on_tick: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("pulse-timer".into())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(poll) {
                        Err(RecvTimeoutError::Timeout) => on_tick(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("timer driver stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn stop(&mut self) {
        // Dropping the sender disconnects the driver's receiver.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
