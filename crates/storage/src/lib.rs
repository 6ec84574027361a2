pub mod conformance;
mod connection;
mod error;
mod file;
mod memory;
mod persist;
mod record;
pub mod schema;
mod traits;

pub use connection::{open_store, MEMORY_CONNECTION};
pub use error::StorageError;
pub use file::FileInstanceStore;
pub use memory::MemoryInstanceStore;
pub use persist::{load_tracker, load_tracker_from, promote_tracker, save_tracker};
pub use record::{PromotedProperties, StoredStateMachine};
pub use traits::InstanceStore;
