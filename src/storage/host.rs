//! Backend presence detection.
//!
//! A [`Host`] answers whether the primary (extension) and secondary (web)
//! engines are reachable from the current execution context. Probing may fail
//! (e.g. an API touched outside its intended context); such failures are
//! logged and treated as "not present", never surfaced to the caller.

use super::area::{ExtensionStorage, WebStorage};
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// The execution context a storage instance lives in.
pub trait Host: Send + Sync {
    /// The extension storage namespace, if reachable.
    fn extension_storage(&self) -> Result<Option<Arc<dyn ExtensionStorage>>>;

    /// The web (local) storage of the current window, if reachable.
    fn web_storage(&self) -> Result<Option<Arc<dyn WebStorage>>>;
}

/// Probes the primary engine. Never fails.
pub fn probe_extension(host: &dyn Host) -> Option<Arc<dyn ExtensionStorage>> {
    host.extension_storage().unwrap_or_else(|e| {
        log::error!("extension storage probe failed: {e:#}");
        None
    })
}

/// Probes the secondary engine. Never fails.
pub fn probe_web(host: &dyn Host) -> Option<Arc<dyn WebStorage>> {
    host.web_storage().unwrap_or_else(|e| {
        log::error!("web storage probe failed: {e:#}");
        None
    })
}

/// A host whose engines are handed in explicitly. Presence can be toggled
/// after construction to model a changing execution context.
#[derive(Default)]
pub struct StaticHost {
    extension: RwLock<Option<Arc<dyn ExtensionStorage>>>,
    web: RwLock<Option<Arc<dyn WebStorage>>>,
    failing: AtomicBool,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(self, extension: Arc<dyn ExtensionStorage>) -> Self {
        self.set_extension(Some(extension));
        self
    }

    pub fn with_web(self, web: Arc<dyn WebStorage>) -> Self {
        self.set_web(Some(web));
        self
    }

    pub fn set_extension(&self, extension: Option<Arc<dyn ExtensionStorage>>) {
        *self.extension.write().unwrap_or_else(PoisonError::into_inner) = extension;
    }

    pub fn set_web(&self, web: Option<Arc<dyn WebStorage>>) {
        *self.web.write().unwrap_or_else(PoisonError::into_inner) = web;
    }

    /// Makes every probe return an error, as touching an API from the wrong context would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Host for StaticHost {
    fn extension_storage(&self) -> Result<Option<Arc<dyn ExtensionStorage>>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("extension storage is not accessible from this context");
        }
        Ok(self.extension.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn web_storage(&self) -> Result<Option<Arc<dyn WebStorage>>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("web storage is not accessible from this context");
        }
        Ok(self.web.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}
