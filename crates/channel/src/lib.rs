mod accumulator;
mod backpressure;
mod channel;
mod config;
mod error;
pub mod serializer;
mod stats;
mod trigger;

pub use accumulator::Accumulator;
pub use backpressure::{Backpressure, BackpressureListener, ChannelBlocked, SubscriptionId};
pub use channel::{Channel, ChannelBuilder, DEFAULT_TIMER_RESOLUTION};
pub use config::{
    ChannelConfig, DEFAULT_BATCH_INTERVAL_SECS, DEFAULT_MAX_BATCH_SIZE, Profile,
    RECOMMENDED_MIN_BATCH_SIZE,
};
pub use error::{ChannelError, ConfigError, DropReason, Dropped};
pub use serializer::{SerializationError, SerializationFailure};
pub use stats::StatsSnapshot;
pub use trigger::{
    Clock, IntervalTrigger, ManualClock, SizeTrigger, SystemClock, TimerMode,
};

pub use pulse_protocol::{Batch, BatchSender, BatchStore, Event, SendError, StoreError, Value};
