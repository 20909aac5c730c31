use super::event::{ChangeBatch, ListenerId};
use crate::config::AreaName;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Object-safe key/value web storage (DOM's Storage). This is the secondary engine.
pub trait WebStorage: Send + Sync {
    /// Retrieves the value associated with the given key, or `None` if not found.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Sets the value for the given key, overwriting any existing value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the item with the given key.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Clears all items in the storage area.
    fn clear(&self) -> Result<()>;

    /// Returns the number of items in the storage area.
    fn len(&self) -> usize;

    /// Returns true when the storage area holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a vector of all keys in the storage area.
    fn keys(&self) -> Vec<String>;
}

/// Which keys a primary read should return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keys {
    All,
    One(String),
    Many(Vec<String>),
}

impl Keys {
    pub fn one(key: impl Into<String>) -> Self {
        Keys::One(key.into())
    }
}

/// One partition (`sync`, `local`, ...) of the primary extension engine.
///
/// All calls may suspend. Missing keys are simply absent from the returned map.
#[async_trait]
pub trait ExtensionArea: Send + Sync {
    async fn get(&self, keys: Keys) -> Result<HashMap<String, String>>;

    /// Writes all items at once. Rejects with
    /// [`StorageError::QuotaExceeded`](crate::StorageError::QuotaExceeded) when
    /// the partition would overflow.
    async fn set(&self, items: HashMap<String, String>) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Bytes currently used by the partition (keys plus values).
    async fn bytes_in_use(&self) -> Result<usize>;

    /// Total byte quota of the partition, when the engine publishes one.
    fn quota_bytes(&self) -> Option<usize> {
        None
    }
}

/// Engine-level change listener: receives every batch together with the area it happened in.
pub type ChangeListener = Arc<dyn Fn(&ChangeBatch, AreaName) + Send + Sync>;

/// Change-notification facility of the primary engine (`onChanged`).
pub trait ChangeHub: Send + Sync {
    fn add_listener(&self, listener: ChangeListener) -> ListenerId;

    /// Removing an unknown id is a no-op.
    fn remove_listener(&self, id: ListenerId);

    fn listener_count(&self) -> usize;
}

/// The primary extension engine as a whole.
pub trait ExtensionStorage: Send + Sync {
    /// Client for one partition, or `None` when the engine does not provide it.
    fn area(&self, name: AreaName) -> Option<Arc<dyn ExtensionArea>>;

    /// Change notifications, or `None` when the engine cannot report changes.
    fn on_changed(&self) -> Option<Arc<dyn ChangeHub>>;
}
