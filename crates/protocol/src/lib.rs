mod batch;
pub mod codec;
mod event;
mod sink;

pub use batch::{Batch, EMPTY_PAYLOAD};
pub use event::{Event, Value};
pub use sink::{BatchSender, BatchStore, SendError, StoreError};
