use crate::config::AreaName;
use crate::errors::StorageError;
use crate::storage::area::{ChangeHub, ChangeListener, ExtensionArea, ExtensionStorage, Keys};
use crate::storage::event::{ChangeBatch, ListenerId, RawChange, StorageEvent};
use crate::DEFAULT_CHANNEL_CAPACITY;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// A handle for receiving every change batch the engine emits.
pub type Subscription = broadcast::Receiver<StorageEvent>;

#[derive(Debug)]
struct StorageBus {
    tx: broadcast::Sender<StorageEvent>,
}

impl Default for StorageBus {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl StorageBus {
    fn subscribe(&self) -> Subscription {
        self.tx.subscribe()
    }
    fn publish(&self, ev: StorageEvent) {
        // send() only fails when nobody is subscribed
        let _ = self.tx.send(ev);
    }
}

/// In-memory `onChanged`: synchronous listeners plus a broadcast bus.
#[derive(Default)]
pub struct InMemoryChangeHub {
    listeners: RwLock<HashMap<ListenerId, ChangeListener>>,
    bus: StorageBus,
}

impl InMemoryChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Delivers a batch to every listener. Empty batches are dropped.
    pub fn notify(&self, area: AreaName, changes: &ChangeBatch) {
        if changes.is_empty() {
            return;
        }
        // Snapshot first: listeners may add or remove listeners while running.
        let listeners: Vec<ChangeListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(changes, area);
        }
        self.bus.publish(StorageEvent {
            area,
            changes: changes.clone(),
        });
    }
}

impl ChangeHub for InMemoryChangeHub {
    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, listener);
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// In-memory extension storage with all four partitions (no persistence).
pub struct InMemoryExtensionStorage {
    areas: HashMap<AreaName, Arc<InMemoryExtensionArea>>,
    hub: Arc<InMemoryChangeHub>,
}

impl Default for InMemoryExtensionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryExtensionStorage {
    pub fn new() -> Self {
        let hub = Arc::new(InMemoryChangeHub::new());
        let areas = AreaName::ALL
            .into_iter()
            .map(|name| (name, Arc::new(InMemoryExtensionArea::new(name, None, hub.clone()))))
            .collect();
        Self { areas, hub }
    }

    /// Caps one partition at `bytes`; writes beyond it are rejected.
    pub fn with_quota(mut self, name: AreaName, bytes: usize) -> Self {
        self.areas.insert(
            name,
            Arc::new(InMemoryExtensionArea::new(name, Some(bytes), self.hub.clone())),
        );
        self
    }

    /// Removes a partition, as engines without e.g. `session` storage do.
    pub fn without_area(mut self, name: AreaName) -> Self {
        self.areas.remove(&name);
        self
    }

    pub fn hub(&self) -> Arc<InMemoryChangeHub> {
        self.hub.clone()
    }

    /// Typed access to a partition (tests and hosts seeding data).
    pub fn in_memory_area(&self, name: AreaName) -> Option<Arc<InMemoryExtensionArea>> {
        self.areas.get(&name).cloned()
    }
}

impl ExtensionStorage for InMemoryExtensionStorage {
    fn area(&self, name: AreaName) -> Option<Arc<dyn ExtensionArea>> {
        self.areas.get(&name).map(|a| a.clone() as Arc<dyn ExtensionArea>)
    }

    fn on_changed(&self) -> Option<Arc<dyn ChangeHub>> {
        Some(self.hub.clone())
    }
}

pub struct InMemoryExtensionArea {
    name: AreaName,
    map: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
    hub: Arc<InMemoryChangeHub>,
}

impl InMemoryExtensionArea {
    fn new(name: AreaName, quota: Option<usize>, hub: Arc<InMemoryChangeHub>) -> Self {
        Self {
            name,
            map: RwLock::new(BTreeMap::new()),
            quota,
            hub,
        }
    }

    /// Current value of a key without going through the async API.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.map.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn usage(map: &BTreeMap<String, String>) -> usize {
        map.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[async_trait]
impl ExtensionArea for InMemoryExtensionArea {
    async fn get(&self, keys: Keys) -> Result<HashMap<String, String>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        let found = match keys {
            Keys::All => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Keys::One(key) => map.get(&key).map(|v| (key, v.clone())).into_iter().collect(),
            Keys::Many(list) => list
                .into_iter()
                .filter_map(|k| map.get(&k).map(|v| (k, v.clone())))
                .collect(),
        };
        Ok(found)
    }

    async fn set(&self, items: HashMap<String, String>) -> Result<()> {
        let changes = {
            let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);

            if let Some(quota) = self.quota {
                let mut projected = map.clone();
                projected.extend(items.iter().map(|(k, v)| (k.clone(), v.clone())));
                let bytes = Self::usage(&projected);
                if bytes > quota {
                    let key = items.keys().next().cloned().unwrap_or_default();
                    return Err(StorageError::QuotaExceeded { key, bytes, quota }.into());
                }
            }

            let mut changes = ChangeBatch::new();
            for (key, value) in items {
                let old = map.insert(key.clone(), value.clone());
                if old.as_deref() != Some(value.as_str()) {
                    changes.insert(key, RawChange { old_value: old, new_value: Some(value) });
                }
            }
            changes
        };
        self.hub.notify(self.name, &changes);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let old = self.map.write().unwrap_or_else(PoisonError::into_inner).remove(key);
        if let Some(old) = old {
            let mut changes = ChangeBatch::new();
            changes.insert(key.to_string(), RawChange { old_value: Some(old), new_value: None });
            self.hub.notify(self.name, &changes);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let drained = std::mem::take(&mut *self.map.write().unwrap_or_else(PoisonError::into_inner));
        let changes: ChangeBatch = drained
            .into_iter()
            .map(|(k, v)| (k, RawChange { old_value: Some(v), new_value: None }))
            .collect();
        self.hub.notify(self.name, &changes);
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<usize> {
        Ok(Self::usage(&self.map.read().unwrap_or_else(PoisonError::into_inner)))
    }

    fn quota_bytes(&self) -> Option<usize> {
        self.quota
    }
}
