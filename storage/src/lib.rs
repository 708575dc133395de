pub mod error;
pub mod loader;
pub mod sink;

pub use error::StorageError;
pub use loader::{EntityLoader, EntitySnapshot, JsonDirLoader, MemoryLoader};
pub use sink::{JsonLinesSink, MemorySink, PersistenceSink};
