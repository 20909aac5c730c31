pub mod config;
pub mod errors;
pub mod storage;

pub use config::{AreaName, StorageConfigError, StorageOptions};
pub use errors::{Result, StorageError};
pub use storage::*;

/// Capacity of the broadcast channels used for change events.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;
