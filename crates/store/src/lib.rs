//! Stores for batches that could not be delivered.

mod disk;
mod memory;

pub use disk::{DEFAULT_LIMIT, DiskStore, STORE_VERSION};
pub use memory::MemoryStore;
