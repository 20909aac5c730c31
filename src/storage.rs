//! Dual-backend storage.
//!
//! This module defines the traits, types, and implementations behind
//! [`Storage`]: one namespaced key/value interface over two engines.
//!
//! # Concepts
//!
//! - **Primary engine**: the partitioned, quota-limited extension
//!   storage ([`ExtensionStorage`] / [`ExtensionArea`]). Asynchronous. Reports
//!   changes through a [`ChangeHub`].
//! - **Secondary engine**: same-origin web storage ([`WebStorage`]).
//!   Synchronous and unlimited. Receives mirrored copies of selected keys and
//!   serves reads when the primary engine is unavailable.
//!
//! Which engines exist is decided by a [`Host`]. Probing failures are logged and
//! treated as absence.
//!
//! # Available types
//!
//! - [`Storage`]: the public accessor (get/set/remove/clear/copy/watch).
//! - [`Namespacer`]: physical key mapping.
//! - [`ValueCodec`], [`JsonCodec`]: value encoding.
//! - [`QuotaGuard`], [`UsageQuotaGuard`]: pre-write quota warnings.
//! - [`CallbackMap`], [`WatchCallback`], [`StorageChange`]: change watching.
//! - [`InMemoryExtensionStorage`], [`InMemoryWebStorage`]: in-memory engines.
//! - [`SqliteWebStorage`]: SQLite-backed persistent web storage.
//!
//! # Example: mirroring a key
//!
//! ```no_run
//! use std::sync::Arc;
//! use ext_storage::{Storage, StorageOptions, StaticHost, InMemoryExtensionStorage, SqliteWebStorage};
//!
//! # async fn demo() -> ext_storage::Result<()> {
//! let origin = url::Url::parse("https://extension.test").unwrap().origin();
//! let host = StaticHost::new()
//!     .with_extension(Arc::new(InMemoryExtensionStorage::new()))
//!     .with_web(Arc::new(SqliteWebStorage::new("web.db", &origin)?));
//!
//! let opts = StorageOptions::builder().copied_key("theme").build()?;
//! let storage = Storage::new(Arc::new(host), opts);
//!
//! // lands in both engines
//! storage.set("theme", &"dark").await?;
//! // primary only
//! storage.set("token", &"secret").await?;
//! # Ok(()) }
//! ```

/// Engine traits: primary areas, change hub, web storage.
pub mod area;
/// Value encoding.
pub mod codec;
/// Change events.
pub mod event;
/// Backend presence detection.
pub mod host;
/// Key namespacing.
pub mod namespace;
/// Quota warnings.
pub mod quota;
/// The storage accessor.
pub mod service;
/// Change multiplexer.
pub mod watch;

/// Primary (extension) engine implementations.
pub mod extension {
    /// In-memory extension storage implementation.
    pub mod in_memory;
}

/// Secondary (web) engine implementations.
pub mod web {
    /// In-memory web storage implementation.
    pub mod in_memory;
    /// SQLite-backed web storage implementation.
    #[cfg(feature = "sqlite_web_storage")]
    pub mod sqlite_store;
}

pub use area::{ChangeHub, ChangeListener, ExtensionArea, ExtensionStorage, Keys, WebStorage};
pub use codec::{JsonCodec, ValueCodec};
pub use event::{ChangeBatch, ListenerId, RawChange, StorageChange, StorageEvent};
pub use extension::in_memory::{InMemoryChangeHub, InMemoryExtensionArea, InMemoryExtensionStorage, Subscription};
pub use host::{Host, StaticHost};
pub use namespace::Namespacer;
pub use quota::{NoQuotaGuard, QuotaGuard, UsageQuotaGuard};
pub use service::{SetOutcome, Storage};
pub use watch::{callback, CallbackMap, WatchCallback};
pub use web::in_memory::InMemoryWebStorage;
#[cfg(feature = "sqlite_web_storage")]
pub use web::sqlite_store::SqliteWebStorage;
