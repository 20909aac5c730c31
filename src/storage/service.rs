use super::area::{ExtensionArea, Keys, WebStorage};
use super::codec::{parse_or_absent, JsonCodec, ValueCodec};
use super::host::{probe_extension, probe_web, Host};
use super::namespace::Namespacer;
use super::quota::{QuotaGuard, UsageQuotaGuard};
use super::watch::{CallbackMap, WatchRegistry};
use crate::config::{AreaName, StorageOptions};
use crate::errors::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

/// What a write did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// Written to the primary engine, with the quota guard's warning if it raised one.
    Stored { warning: Option<String> },
    /// The primary engine is unavailable. The value only reached the
    /// secondary engine if the key is mirrored.
    PrimaryUnavailable,
}

impl SetOutcome {
    pub fn warning(&self) -> Option<&str> {
        match self {
            SetOutcome::Stored { warning } => warning.as_deref(),
            SetOutcome::PrimaryUnavailable => None,
        }
    }

    pub fn reached_primary(&self) -> bool {
        matches!(self, SetOutcome::Stored { .. })
    }
}

/// Namespaced key/value storage over a primary extension engine, mirroring
/// selected keys into a secondary web storage.
///
/// Reads prefer the primary engine and fall back to the secondary one for
/// mirrored keys. Writes and removals of mirrored keys hit both engines,
/// secondary first.
///
/// ```
/// # use std::sync::Arc;
/// # use ext_storage::{Storage, StorageOptions, StaticHost, InMemoryExtensionStorage, InMemoryWebStorage};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ext_storage::Result<()> {
/// let host = StaticHost::new()
///     .with_extension(Arc::new(InMemoryExtensionStorage::new()))
///     .with_web(Arc::new(InMemoryWebStorage::new()));
/// let storage = Storage::new(Arc::new(host), StorageOptions::builder().all_copied(true).build()?);
///
/// storage.set("greeting", &"hello").await?;
/// let value: Option<String> = storage.get("greeting").await?;
/// assert_eq!(value.as_deref(), Some("hello"));
/// # Ok(()) }
/// ```
pub struct Storage {
    area: AreaName,
    should_check_quota: bool,
    all_copied: bool,
    copied_key_set: RwLock<HashSet<String>>,
    namespace: RwLock<Namespacer>,
    host: Arc<dyn Host>,
    primary: Option<Arc<dyn ExtensionArea>>,
    secondary: Option<Arc<dyn WebStorage>>,
    watch: Option<WatchRegistry>,
    codec: Arc<dyn ValueCodec>,
    quota: Arc<dyn QuotaGuard>,
}

impl Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("area", &self.area)
            .field("namespace", &self.namespace())
            .field("all_copied", &self.all_copied)
            .field("has_primary", &self.primary.is_some())
            .field("has_secondary", &self.secondary.is_some())
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Binds to the engines the host exposes right now. Client handles are
    /// resolved once here and kept for the lifetime of the instance.
    pub fn new(host: Arc<dyn Host>, options: StorageOptions) -> Self {
        let mirrors = options.mirrors_anything();
        let StorageOptions { area, unlimited, all_copied, copied_key_list } = options;

        let secondary = if mirrors {
            probe_web(host.as_ref())
        } else {
            None
        };

        let extension = probe_extension(host.as_ref());
        let primary = extension.as_ref().and_then(|e| e.area(area));
        if extension.is_some() && primary.is_none() {
            log::warn!("extension storage has no '{area}' area");
        }

        let codec: Arc<dyn ValueCodec> = Arc::new(JsonCodec);
        let watch = extension
            .as_ref()
            .and_then(|e| e.on_changed())
            .map(|hub| WatchRegistry::new(hub, area, codec.clone()));

        log::debug!(
            "storage: area={area} primary={} secondary={} watch={}",
            primary.is_some(),
            secondary.is_some(),
            watch.is_some()
        );

        Self {
            area,
            should_check_quota: !unlimited,
            all_copied,
            copied_key_set: RwLock::new(copied_key_list.into_iter().collect()),
            namespace: RwLock::new(Namespacer::default()),
            host,
            primary,
            secondary,
            watch,
            codec,
            quota: Arc::new(UsageQuotaGuard::default()),
        }
    }

    /// Replaces the value codec. Call before installing watches; existing
    /// registrations are dropped.
    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.watch = self.watch.take().map(|old| old.rebuild(codec.clone()));
        self.codec = codec;
        self
    }

    pub fn with_quota_guard(mut self, guard: Arc<dyn QuotaGuard>) -> Self {
        self.quota = guard;
        self
    }

    // ---------- Accessors ----------

    pub fn area(&self) -> AreaName {
        self.area
    }

    pub fn all_copied(&self) -> bool {
        self.all_copied
    }

    pub fn should_check_quota(&self) -> bool {
        self.should_check_quota
    }

    pub fn copied_key_set(&self) -> HashSet<String> {
        self.copied_key_set.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the copy set wholesale.
    pub fn set_copied_key_set<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.copied_key_set.write().unwrap_or_else(PoisonError::into_inner) =
            keys.into_iter().map(Into::into).collect();
    }

    pub fn primary_client(&self) -> Option<&Arc<dyn ExtensionArea>> {
        self.primary.as_ref()
    }

    pub fn secondary_client(&self) -> Option<&Arc<dyn WebStorage>> {
        self.secondary.as_ref()
    }

    /// Re-probes the host; unlike the cached client this reflects the current context.
    pub fn has_extension_api(&self) -> bool {
        probe_extension(self.host.as_ref()).is_some()
    }

    /// Re-probes the host; unlike the cached client this reflects the current context.
    pub fn has_web_api(&self) -> bool {
        probe_web(self.host.as_ref()).is_some()
    }

    pub fn is_watch_supported(&self) -> bool {
        self.watch.is_some()
    }

    /// Whether writes and removals of this physical key are mirrored. The copy
    /// set holds logical keys, so only keys inside the namespace can match it.
    pub fn is_copied(&self, key: &str) -> bool {
        if self.secondary.is_none() {
            return false;
        }
        if self.all_copied {
            return true;
        }
        let ns = self.namespacer();
        ns.is_valid_key(key)
            && self
                .copied_key_set
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(ns.unnamespaced_key(key))
    }

    // ---------- Namespacing ----------

    pub fn namespace(&self) -> String {
        self.namespacer().prefix().to_string()
    }

    /// Only affects later operations; nothing already stored is moved.
    pub fn set_namespace(&self, namespace: impl Into<String>) {
        *self.namespace.write().unwrap_or_else(PoisonError::into_inner) = Namespacer::new(namespace);
    }

    pub fn namespaced_key(&self, key: &str) -> String {
        self.namespacer().namespaced_key(key)
    }

    pub fn unnamespaced_key(&self, physical: &str) -> String {
        self.namespacer().unnamespaced_key(physical).to_string()
    }

    pub fn is_valid_key(&self, physical: &str) -> bool {
        self.namespacer().is_valid_key(physical)
    }

    fn namespacer(&self) -> Namespacer {
        self.namespace.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // ---------- Raw access (physical keys) ----------

    /// Every raw value of this namespace in the primary area, by physical key.
    /// Empty without a primary engine.
    pub async fn get_all(&self) -> Result<HashMap<String, String>> {
        let Some(primary) = &self.primary else {
            return Ok(HashMap::new());
        };
        let ns = self.namespacer();
        let mut all = primary.get(Keys::All).await?;
        all.retain(|k, _| ns.is_valid_key(k));
        Ok(all)
    }

    pub async fn raw_get(&self, key: &str) -> Result<Option<String>> {
        if let Some(primary) = &self.primary {
            let mut found = primary.get(Keys::one(key)).await?;
            return Ok(found.remove(key));
        }

        if self.is_copied(key) {
            return Ok(self.secondary.as_ref().and_then(|s| s.get_item(key)));
        }

        Ok(None)
    }

    pub async fn raw_set(&self, key: &str, value: &str) -> Result<SetOutcome> {
        if self.is_copied(key) {
            if let Some(secondary) = &self.secondary {
                if let Err(e) = secondary.set_item(key, value) {
                    log::error!("mirroring {key:?} into web storage failed: {e:#}");
                }
            }
        }

        let Some(primary) = &self.primary else {
            return Ok(SetOutcome::PrimaryUnavailable);
        };

        let warning = if self.should_check_quota {
            self.quota.quota_warning(self, key, value).await?
        } else {
            None
        };
        if let Some(w) = &warning {
            log::warn!("{key:?}: {w}");
        }

        primary.set(HashMap::from([(key.to_string(), value.to_string())])).await?;
        Ok(SetOutcome::Stored { warning })
    }

    pub async fn raw_remove(&self, key: &str) -> Result<()> {
        if self.is_copied(key) {
            if let Some(secondary) = &self.secondary {
                if let Err(e) = secondary.remove_item(key) {
                    log::error!("removing {key:?} from web storage failed: {e:#}");
                }
            }
        }

        if let Some(primary) = &self.primary {
            primary.remove(key).await?;
        }
        Ok(())
    }

    /// Clears the primary area. With `include_copies` the whole secondary
    /// storage is cleared too, not only this namespace. A failing secondary
    /// clear is logged; the primary area is cleared regardless.
    pub async fn clear(&self, include_copies: bool) -> Result<()> {
        if include_copies {
            if let Some(secondary) = &self.secondary {
                if let Err(e) = secondary.clear() {
                    log::error!("clearing web storage failed: {e:#}");
                }
            }
        }

        match &self.primary {
            Some(primary) => primary.clear().await?,
            None => log::debug!("clear: no primary '{}' area", self.area),
        }
        Ok(())
    }

    /// Mirrors primary values into the secondary engine once.
    ///
    /// `None` mirrors the whole copy set. Returns `false` without touching
    /// anything unless `all_copied` is set, the primary engine is present and
    /// (for a single key) the key is in the copy set. Otherwise returns
    /// whether any value in the secondary engine changed. Keys the secondary
    /// engine refuses are logged and skipped.
    pub async fn copy(&self, key: Option<&str>) -> Result<bool> {
        if let Some(key) = key {
            if !self.copied_key_set.read().unwrap_or_else(PoisonError::into_inner).contains(key) {
                return Ok(false);
            }
        }
        if !self.all_copied {
            return Ok(false);
        }
        if self.primary.is_none() {
            return Ok(false);
        }

        // all_copied holds past the guard, so this is always a full read
        let data = self.get_all().await?;

        let Some(secondary) = &self.secondary else {
            return Ok(false);
        };

        let mut changed = false;
        for (k, value) in &data {
            if secondary.get_item(k).as_deref() == Some(value.as_str()) {
                continue;
            }
            match secondary.set_item(k, value) {
                Ok(()) => changed = true,
                Err(e) => log::error!("mirroring {k:?} into web storage failed: {e:#}"),
            }
        }
        log::debug!("copy: mirrored {} key(s), changed={changed}", data.len());
        Ok(changed)
    }

    // ---------- Values (logical keys) ----------

    /// Reads and decodes a value. Values that fail to decode are logged and
    /// reported as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = self.raw_get(&self.namespaced_key(key)).await?;
        let Some(value) = parse_or_absent(self.codec.as_ref(), raw.as_deref()) else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                log::error!("stored value of {key:?} has an unexpected shape: {e}");
                Ok(None)
            }
        }
    }

    /// Encodes and writes a value. Fails if the primary engine rejects the
    /// write (e.g. [`QuotaExceeded`](crate::StorageError::QuotaExceeded)).
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<SetOutcome> {
        let raw = self.codec.serialize(&serde_json::to_value(value)?)?;
        self.raw_set(&self.namespaced_key(key), &raw).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.raw_remove(&self.namespaced_key(key)).await
    }

    // ---------- Watching ----------

    /// Registers callbacks per logical key. Returns `false` and does nothing
    /// when the engine cannot report changes.
    pub fn watch(&self, callbacks: &CallbackMap) -> bool {
        match &self.watch {
            Some(registry) => {
                registry.add(&self.namespacer(), callbacks);
                true
            }
            None => false,
        }
    }

    pub fn unwatch(&self, callbacks: &CallbackMap) -> bool {
        match &self.watch {
            Some(registry) => {
                registry.remove(&self.namespacer(), callbacks);
                true
            }
            None => false,
        }
    }

    pub fn unwatch_all(&self) {
        if let Some(registry) = &self.watch {
            registry.remove_all();
        }
    }

    /// Whether an engine listener is installed for the logical key.
    pub fn is_watched(&self, key: &str) -> bool {
        self.watch
            .as_ref()
            .is_some_and(|r| r.is_registered(&self.namespaced_key(key)))
    }

    /// Number of callbacks registered for the logical key.
    pub fn watcher_count(&self, key: &str) -> usize {
        self.watch
            .as_ref()
            .map_or(0, |r| r.callback_count(&self.namespaced_key(key)))
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        self.unwatch_all();
    }
}
