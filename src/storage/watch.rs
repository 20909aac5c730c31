//! Change multiplexer.
//!
//! Many application callbacks share engine-level subscriptions: every
//! namespaced key that has at least one callback owns exactly one listener on
//! the engine's [`ChangeHub`]; the listener goes away with the last callback.
//!
//! A listener remembers the logical keys of the `watch` call that installed
//! it and only reacts to those keys. It fans a change out only for keys whose
//! registration it owns, so a change is delivered once per callback even when
//! one call installed listeners for several keys.

use super::area::{ChangeHub, ChangeListener};
use super::codec::{parse_or_absent, ValueCodec};
use super::event::{ChangeBatch, ListenerId, StorageChange};
use super::namespace::Namespacer;
use crate::config::AreaName;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

/// Application-level callback: receives the parsed change and the area it happened in.
pub type WatchCallback = Arc<dyn Fn(&StorageChange, AreaName) + Send + Sync>;

/// Logical key to callback, as passed to `watch` / `unwatch`.
pub type CallbackMap = BTreeMap<String, WatchCallback>;

/// Wraps a closure into a [`WatchCallback`].
pub fn callback<F>(f: F) -> WatchCallback
where
    F: Fn(&StorageChange, AreaName) + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Registration {
    callbacks: Vec<WatchCallback>,
    listener: ListenerId,
}

impl Registration {
    fn contains(&self, cb: &WatchCallback) -> bool {
        self.callbacks.iter().any(|c| Arc::ptr_eq(c, cb))
    }
}

type Entries = Mutex<HashMap<String, Registration>>;

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, Registration>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct WatchRegistry {
    hub: Arc<dyn ChangeHub>,
    area: AreaName,
    codec: Arc<dyn ValueCodec>,
    entries: Arc<Entries>,
}

impl WatchRegistry {
    pub(crate) fn new(hub: Arc<dyn ChangeHub>, area: AreaName, codec: Arc<dyn ValueCodec>) -> Self {
        Self {
            hub,
            area,
            codec,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fresh registry on the same hub with another codec. Drops this one's listeners.
    pub(crate) fn rebuild(self, codec: Arc<dyn ValueCodec>) -> Self {
        self.remove_all();
        Self::new(self.hub.clone(), self.area, codec)
    }

    pub(crate) fn add(&self, ns: &Namespacer, callbacks: &CallbackMap) {
        let call_keys: Arc<HashSet<String>> = Arc::new(callbacks.keys().cloned().collect());
        let mut entries = lock(&self.entries);

        for (key, cb) in callbacks {
            let ns_key = ns.namespaced_key(key);

            if let Some(reg) = entries.get_mut(&ns_key) {
                if !reg.contains(cb) {
                    reg.callbacks.push(cb.clone());
                }
                continue;
            }

            let own_id = Arc::new(OnceLock::new());
            let listener = self.listener(ns.prefix().to_string(), call_keys.clone(), own_id.clone());
            let id = self.hub.add_listener(listener);
            let _ = own_id.set(id);

            log::debug!("watch: installed listener {id} for {ns_key:?}");
            entries.insert(
                ns_key,
                Registration {
                    callbacks: vec![cb.clone()],
                    listener: id,
                },
            );
        }
    }

    pub(crate) fn remove(&self, ns: &Namespacer, callbacks: &CallbackMap) {
        let mut entries = lock(&self.entries);

        for (key, cb) in callbacks {
            let ns_key = ns.namespaced_key(key);
            let Some(reg) = entries.get_mut(&ns_key) else {
                continue;
            };

            reg.callbacks.retain(|c| !Arc::ptr_eq(c, cb));
            if reg.callbacks.is_empty() {
                let listener = reg.listener;
                entries.remove(&ns_key);
                self.hub.remove_listener(listener);
                log::debug!("watch: removed listener {listener} for {ns_key:?}");
            }
        }
    }

    pub(crate) fn remove_all(&self) {
        let mut entries = lock(&self.entries);
        for (ns_key, reg) in entries.drain() {
            self.hub.remove_listener(reg.listener);
            log::debug!("watch: removed listener {} for {ns_key:?}", reg.listener);
        }
    }

    pub(crate) fn is_registered(&self, ns_key: &str) -> bool {
        lock(&self.entries).contains_key(ns_key)
    }

    pub(crate) fn callback_count(&self, ns_key: &str) -> usize {
        lock(&self.entries).get(ns_key).map_or(0, |r| r.callbacks.len())
    }

    #[cfg(test)]
    fn registration_count(&self) -> usize {
        lock(&self.entries).len()
    }

    fn listener(
        &self,
        prefix: String,
        call_keys: Arc<HashSet<String>>,
        own_id: Arc<OnceLock<ListenerId>>,
    ) -> ChangeListener {
        let dispatch = Dispatch {
            area: self.area,
            prefix,
            call_keys,
            own_id,
            codec: self.codec.clone(),
            entries: Arc::downgrade(&self.entries),
        };
        Arc::new(move |batch: &ChangeBatch, area: AreaName| dispatch.handle(batch, area))
    }
}

struct Dispatch {
    area: AreaName,
    prefix: String,
    call_keys: Arc<HashSet<String>>,
    own_id: Arc<OnceLock<ListenerId>>,
    codec: Arc<dyn ValueCodec>,
    entries: Weak<Entries>,
}

impl Dispatch {
    fn handle(&self, batch: &ChangeBatch, area: AreaName) {
        if area != self.area {
            return;
        }
        let Some(entries) = self.entries.upgrade() else {
            return;
        };

        let relevant = batch.iter().filter(|(physical, _)| {
            physical
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|logical| self.call_keys.contains(logical))
        });

        for (physical, change) in relevant {
            // The lock is released before callbacks run so they may unwatch.
            let callbacks = {
                let entries = lock(&entries);
                match entries.get(physical) {
                    Some(reg) if Some(&reg.listener) == self.own_id.get() => reg.callbacks.clone(),
                    _ => continue,
                }
            };

            let parsed = StorageChange {
                new_value: parse_or_absent(self.codec.as_ref(), change.new_value.as_deref()),
                old_value: parse_or_absent(self.codec.as_ref(), change.old_value.as_deref()),
            };
            log::trace!("watch: {physical:?} changed in {area}, notifying {} callback(s)", callbacks.len());
            for cb in &callbacks {
                cb(&parsed, area);
            }
        }
    }
}
