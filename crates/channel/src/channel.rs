use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Condvar, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use chrono::Utc;
use crossbeam::channel::{self as cb, Receiver, Sender};
use log::{debug, error, info, warn};
use pulse_protocol::{Batch, BatchSender, BatchStore, Event, SendError, StoreError};

use crate::{
    accumulator::Accumulator,
    backpressure::{Backpressure, BackpressureListener, ChannelBlocked, SubscriptionId},
    config::{ChannelConfig, validate_thresholds},
    error::{ChannelError, ConfigError, Dropped},
    serializer,
    stats::{ChannelStats, StatsSnapshot, bump},
    trigger::{Clock, IntervalTrigger, SizeTrigger, SystemClock, TimerDriver},
};

/// How often the timer thread checks the interval deadline.
pub const DEFAULT_TIMER_RESOLUTION: Duration = Duration::from_millis(250);

/// Rough per-event size used to presize the batch buffer.
const EVENT_SIZE_HINT: usize = 256;
const MAX_CAPACITY_HINT: usize = 1024 * 1024;

enum Job {
    Deliver(Batch),
    Replay,
}

struct State {
    accumulator: Accumulator,
    size: SizeTrigger,
    interval: IntervalTrigger,
    /// A batch has been taken and its handoff has not finished.
    blocked: bool,
    /// Set by shutdown; no further events are accepted.
    closed: bool,
    next_sequence: u64,
}

struct Inner {
    state: Mutex<State>,
    idle: Condvar,
    enabled: AtomicBool,
    sender: Arc<dyn BatchSender>,
    store: Arc<dyn BatchStore>,
    clock: Arc<dyn Clock>,
    backpressure: Backpressure,
    stats: ChannelStats,
    jobs: Mutex<Option<Sender<Job>>>,
}

/// Batches events from many producers and hands full batches to a sender,
/// falling back to a store.
///
/// Every mutation of the pending batch goes through one writer lock, so
/// append, count and threshold check are observed as a single step. Sender
/// and store I/O happen on a dedicated flush thread; producers never wait on
/// it. At most one flush is in flight: while it is, the channel is blocked
/// and `enqueue` drops events.
pub struct Channel {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    timer: Mutex<Option<TimerDriver>>,
    shutdown_timeout: Duration,
    shut_down: AtomicBool,
}

pub struct ChannelBuilder {
    config: ChannelConfig,
    sender: Arc<dyn BatchSender>,
    store: Arc<dyn BatchStore>,
    clock: Arc<dyn Clock>,
    spawn_timer: bool,
    timer_resolution: Duration,
}

impl ChannelBuilder {
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Do not start the timer thread; interval flushes only happen when
    /// [`Channel::tick`] is called.
    pub fn manual_timer(mut self) -> Self {
        self.spawn_timer = false;
        self
    }

    pub fn timer_resolution(mut self, resolution: Duration) -> Self {
        self.timer_resolution = resolution.max(Duration::from_millis(1));
        self
    }

    pub fn build(self) -> Result<Channel, ChannelError> {
        self.config.validate()?;

        let now = self.clock.now();
        let capacity_hint = self
            .config
            .max_batch_size
            .saturating_mul(EVENT_SIZE_HINT)
            .min(MAX_CAPACITY_HINT);

        let state = State {
            accumulator: Accumulator::new(capacity_hint),
            size: SizeTrigger::new(self.config.max_batch_size),
            interval: IntervalTrigger::new(
                self.config.batch_interval(),
                self.config.timer_mode,
                now,
            ),
            blocked: false,
            closed: false,
            next_sequence: 0,
        };

        let (job_tx, job_rx) = cb::unbounded::<Job>();

        let inner = Arc::new(Inner {
            state: Mutex::new(state),
            idle: Condvar::new(),
            enabled: AtomicBool::new(self.config.enabled),
            sender: self.sender,
            store: self.store,
            clock: self.clock,
            backpressure: Backpressure::new(),
            stats: ChannelStats::default(),
            jobs: Mutex::new(Some(job_tx)),
        });

        let worker = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("pulse-flush".into())
                .spawn(move || run_worker(inner, job_rx))
        };
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                inner.close_jobs();
                return Err(e.into());
            }
        };

        let timer = if self.spawn_timer {
            let weak = Arc::downgrade(&inner);
            let spawned = TimerDriver::spawn(self.timer_resolution, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.tick();
                }
            });
            match spawned {
                Ok(driver) => Some(driver),
                Err(e) => {
                    inner.close_jobs();
                    let _ = worker.join();
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        info!(
            "telemetry channel started: enabled={}, max_batch_size={}, batch_interval={}s, timer={:?}",
            self.config.enabled,
            self.config.max_batch_size,
            self.config.batch_interval_secs,
            self.config.timer_mode,
        );

        Ok(Channel {
            inner,
            worker: Mutex::new(Some(worker)),
            timer: Mutex::new(timer),
            shutdown_timeout: self.config.shutdown_timeout,
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Channel {
    pub fn builder(sender: Arc<dyn BatchSender>, store: Arc<dyn BatchStore>) -> ChannelBuilder {
        ChannelBuilder {
            config: ChannelConfig::default(),
            sender,
            store,
            clock: Arc::new(SystemClock),
            spawn_timer: true,
            timer_resolution: DEFAULT_TIMER_RESOLUTION,
        }
    }

    /// A channel with `config`, the system clock and a running timer.
    pub fn new(
        config: ChannelConfig,
        sender: Arc<dyn BatchSender>,
        store: Arc<dyn BatchStore>,
    ) -> Result<Self, ChannelError> {
        Self::builder(sender, store).config(config).build()
    }

    /// Adds `event` to the current batch, flushing if the batch is full.
    ///
    /// Never blocks on I/O. A dropped event is gone; nothing is retried.
    pub fn enqueue(&self, event: Event) -> Result<(), Dropped> {
        let inner = &self.inner;

        if !inner.enabled.load(Ordering::Acquire) {
            bump(&inner.stats.dropped_disabled);
            return Err(Dropped::disabled());
        }

        let fragment = match serializer::serialize(&event) {
            Ok(fragment) => fragment,
            Err(e) => {
                bump(&inner.stats.dropped_malformed);
                debug!("dropping malformed event: {e}");
                return Err(e.into());
            }
        };

        let flushed = {
            let mut state = inner.lock_state();
            if state.closed {
                bump(&inner.stats.dropped_disabled);
                return Err(Dropped::disabled());
            }
            if state.blocked {
                bump(&inner.stats.dropped_busy);
                return Err(Dropped::busy());
            }

            state.accumulator.append(&fragment);
            bump(&inner.stats.enqueued);

            let now = inner.clock.now();
            state.interval.arm(now);

            if state.size.is_reached(state.accumulator.len()) {
                inner.begin_flush(&mut state, now)
            } else {
                None
            }
        };

        if let Some(batch) = flushed {
            inner.dispatch(batch);
        }
        Ok(())
    }

    /// Hands the current batch to the flush worker. No-op when the batch is
    /// empty or another flush is still in flight.
    pub fn flush(&self) {
        let flushed = {
            let mut state = self.inner.lock_state();
            if state.closed {
                return;
            }
            if state.blocked {
                debug!("flush requested while another flush is in flight; ignored");
                return;
            }
            let now = self.inner.clock.now();
            self.inner.begin_flush(&mut state, now)
        };

        if let Some(batch) = flushed {
            self.inner.dispatch(batch);
        }
    }

    /// Timer callback: flushes when the interval has elapsed and the batch
    /// is non-empty. Called by the timer thread, or by hand with a manual
    /// timer.
    pub fn tick(&self) {
        self.inner.tick();
    }

    /// Updates both thresholds. A batch that already meets the new size is
    /// flushed immediately.
    pub fn configure(
        &self,
        max_batch_size: usize,
        batch_interval_secs: u64,
    ) -> Result<(), ConfigError> {
        validate_thresholds(max_batch_size, batch_interval_secs)?;

        let flushed = {
            let mut state = self.inner.lock_state();
            let now = self.inner.clock.now();
            state.size = SizeTrigger::new(max_batch_size);
            state
                .interval
                .set_period(Duration::from_secs(batch_interval_secs), now);

            if !state.closed && state.size.is_reached(state.accumulator.len()) {
                self.inner.begin_flush(&mut state, now)
            } else {
                None
            }
        };

        if let Some(batch) = flushed {
            self.inner.dispatch(batch);
        }
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.inner.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!("telemetry channel {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// True when an enqueue right now would be dropped for lack of room.
    /// Producers may check this first to skip building an event.
    pub fn is_queue_busy(&self) -> bool {
        let state = self.inner.lock_state();
        state.blocked || state.size.is_reached(state.accumulator.len())
    }

    pub fn is_blocked(&self) -> bool {
        self.inner.lock_state().blocked
    }

    pub fn item_count(&self) -> usize {
        self.inner.lock_state().accumulator.len()
    }

    pub fn max_batch_size(&self) -> usize {
        self.inner.lock_state().size.max()
    }

    pub fn batch_interval(&self) -> Duration {
        self.inner.lock_state().interval.period()
    }

    /// Waits until no flush is in flight. Returns false on timeout.
    ///
    /// Not for producer threads; meant for wiring, shutdown and tests.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner.wait_idle(timeout)
    }

    /// Writes the pending events straight to the store, bypassing the
    /// sender. Runs on the calling thread.
    pub fn persist_pending(&self) -> Result<usize, StoreError> {
        let batch = {
            let mut state = self.inner.lock_state();
            if state.accumulator.is_empty() {
                return Ok(0);
            }
            let now = self.inner.clock.now();
            let batch = self.inner.take_batch(&mut state);
            state.interval.reset(now);
            batch
        };

        let count = batch.item_count();
        match self.inner.store.store(batch) {
            Ok(()) => {
                bump(&self.inner.stats.batches_stored);
                Ok(count)
            }
            Err(e) => {
                bump(&self.inner.stats.batches_lost);
                error!("failed to persist {count} pending events: {e}");
                Err(e)
            }
        }
    }

    /// Queues a resend of everything in the store on the flush worker.
    /// Returns false once the channel has shut down.
    ///
    /// The store is drained before the first resend, so batches not yet
    /// resent are lost if the process dies mid-replay. Batches that fail to
    /// send are stored back.
    pub fn replay_stored(&self) -> bool {
        self.inner.submit(Job::Replay).is_ok()
    }

    pub fn backpressure(&self) -> &Backpressure {
        &self.inner.backpressure
    }

    pub fn subscribe(&self, listener: Arc<dyn BackpressureListener>) -> SubscriptionId {
        self.inner.backpressure.subscribe(listener)
    }

    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<ChannelBlocked>) {
        self.inner.backpressure.subscribe_channel()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Stops the timer, waits for an in-flight flush, stores whatever is
    /// still pending and stops the flush worker. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("shutting down telemetry channel");

        if let Some(mut timer) = lock(&self.timer).take() {
            timer.stop();
        }

        let drained = self.inner.wait_idle(self.shutdown_timeout);
        if !drained {
            warn!(
                "in-flight flush did not finish within {:?}",
                self.shutdown_timeout
            );
        }

        {
            let mut state = self.inner.lock_state();
            state.closed = true;
            if !state.accumulator.is_empty() {
                let batch = self.inner.take_batch(&mut state);
                info!("storing {} pending events on shutdown", batch.item_count());
                self.inner.persist(batch);
            }
        }

        self.inner.close_jobs();

        if let Some(handle) = lock(&self.worker).take() {
            if !drained {
                // The worker is stuck in a send; leave it behind.
                return;
            }
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("flush worker panicked");
            }
        }

        info!("telemetry channel shut down: {:?}", self.inner.stats.snapshot());
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    fn take_batch(&self, state: &mut State) -> Batch {
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.accumulator.snapshot_and_reset(sequence, Utc::now())
    }

    /// Takes the pending batch and marks the channel blocked. Must be
    /// followed by `dispatch` once the writer lock is released.
    fn begin_flush(&self, state: &mut State, now: Instant) -> Option<Batch> {
        if state.blocked || state.accumulator.is_empty() {
            return None;
        }

        let batch = self.take_batch(state);
        state.interval.reset(now);
        state.blocked = true;
        bump(&self.stats.flushes);
        debug!(
            "flushing batch {} with {} events",
            batch.sequence(),
            batch.item_count()
        );
        Some(batch)
    }

    fn dispatch(&self, batch: Batch) {
        if let Err(Job::Deliver(batch)) = self.submit(Job::Deliver(batch)) {
            warn!(
                "flush worker unavailable; storing batch {} directly",
                batch.sequence()
            );
            self.persist(batch);
            self.finish_flush();
        }

        self.backpressure.notify();
    }

    fn submit(&self, job: Job) -> Result<(), Job> {
        let tx = lock(&self.jobs).clone();
        match tx {
            Some(tx) => tx.send(job).map_err(|cb::SendError(job)| job),
            None => Err(job),
        }
    }

    fn close_jobs(&self) {
        lock(&self.jobs).take();
    }

    fn tick(&self) {
        let flushed = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            let now = self.clock.now();
            if !state.interval.poll(now) {
                return;
            }
            self.begin_flush(&mut state, now)
        };

        if let Some(batch) = flushed {
            self.dispatch(batch);
        }
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        while state.blocked {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .idle
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
        true
    }

    fn finish_flush(&self) {
        self.lock_state().blocked = false;
        self.idle.notify_all();
    }

    /// `send`, with a panicking sender reported as a rejection.
    fn try_send(&self, batch: &Batch) -> Result<(), SendError> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            if self.sender.is_available() {
                self.sender.send(batch)
            } else {
                Err(SendError::Unavailable)
            }
        }))
        .unwrap_or_else(|_| {
            error!("sender panicked on batch {}", batch.sequence());
            Err(SendError::Rejected("sender panicked".into()))
        })
    }

    fn deliver(&self, batch: Batch) {
        match self.try_send(&batch) {
            Ok(()) => {
                bump(&self.stats.batches_sent);
                debug!(
                    "sent batch {} with {} events",
                    batch.sequence(),
                    batch.item_count()
                );
            }
            Err(SendError::Unavailable) => {
                debug!(
                    "sender unavailable; storing batch {} directly",
                    batch.sequence()
                );
                self.persist(batch);
            }
            Err(e) => {
                warn!(
                    "failed to send batch {} ({} events), storing it: {e}",
                    batch.sequence(),
                    batch.item_count()
                );
                self.persist(batch);
            }
        }
    }

    /// Store is the last resort; a failure here loses the batch.
    fn persist(&self, batch: Batch) -> bool {
        let sequence = batch.sequence();
        let count = batch.item_count();
        let stored = panic::catch_unwind(AssertUnwindSafe(|| self.store.store(batch)));
        match stored {
            Ok(Ok(())) => {
                bump(&self.stats.batches_stored);
                true
            }
            Ok(Err(e)) => {
                bump(&self.stats.batches_lost);
                error!("batch {sequence} with {count} events lost: {e}");
                false
            }
            Err(_) => {
                bump(&self.stats.batches_lost);
                error!("batch {sequence} with {count} events lost: store panicked");
                false
            }
        }
    }

    fn replay(&self) {
        let stored = match self.store.drain_stored() {
            Ok(stored) => stored,
            Err(e) => {
                warn!("cannot read stored batches: {e}");
                return;
            }
        };
        if stored.is_empty() {
            return;
        }

        info!("replaying {} stored batches", stored.len());

        let mut pending = stored.into_iter();
        while let Some(batch) = pending.next() {
            match self.try_send(&batch) {
                Ok(()) => bump(&self.stats.batches_replayed),
                Err(e) => {
                    warn!("replay stopped at batch {}: {e}", batch.sequence());
                    self.persist(batch);
                    for rest in pending.by_ref() {
                        self.persist(rest);
                    }
                }
            }
        }
    }
}

fn run_worker(inner: Arc<Inner>, jobs: Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Deliver(batch) => {
                inner.deliver(batch);
                inner.finish_flush();
            }
            Job::Replay => inner.replay(),
        }
    }
    debug!("flush worker stopped");
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
