use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use anyhow::Result;
use crate::storage::area::WebStorage;

/// In‑memory web storage (no persistence). Used when the host has no persistent localStorage.
#[derive(Default)]
pub struct InMemoryWebStorage {
    map: RwLock<HashMap<String, String>>,
}

impl InMemoryWebStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WebStorage for InMemoryWebStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.map.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.map.write().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.map.write().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn keys(&self) -> Vec<String> {
        let mut v: Vec<String> = self
            .map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        v.sort_unstable(); // deterministic order for callers and tests
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sorted() {
        let store = InMemoryWebStorage::new();
        store.set_item("b", "2").unwrap();
        store.set_item("a", "1").unwrap();
        store.set_item("c", "3").unwrap();
        assert_eq!(store.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn removing_missing_key_is_fine() {
        let store = InMemoryWebStorage::new();
        store.remove_item("nope").unwrap();
        assert!(store.is_empty());
    }
}
