use std::io;

use thiserror::Error;

use crate::serializer::SerializationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DropReason {
    #[error("channel is busy flushing")]
    ChannelBusy,
    #[error("channel is disabled")]
    Disabled,
    #[error(transparent)]
    Malformed(#[from] SerializationError),
}

/// An event that was discarded instead of enqueued.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("event dropped: {reason}")]
pub struct Dropped {
    pub reason: DropReason,
}

impl Dropped {
    pub(crate) fn busy() -> Self {
        Self {
            reason: DropReason::ChannelBusy,
        }
    }

    pub(crate) fn disabled() -> Self {
        Self {
            reason: DropReason::Disabled,
        }
    }
}

impl From<SerializationError> for Dropped {
    fn from(err: SerializationError) -> Self {
        Self {
            reason: DropReason::Malformed(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max batch size must be at least 1")]
    ZeroBatchSize,
    #[error("batch interval must be at least 1 second")]
    ZeroInterval,
    #[error("unknown profile `{0}` (expected strict, standard or debug)")]
    UnknownProfile(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid channel configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to start channel thread: {0}")]
    Spawn(#[from] io::Error),
}
