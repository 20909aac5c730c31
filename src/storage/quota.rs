//! Quota warnings for writes into the primary engine.
//!
//! The guard is advisory: it runs before a primary write and its warning is
//! handed back to the caller, but the write is attempted either way. An
//! actual overflow is reported by the engine itself when the write is rejected.

use super::area::Keys;
use super::service::Storage;
use crate::config::AreaName;
use crate::errors::Result;
use async_trait::async_trait;

/// Documented quota of the `sync` area, used when the engine does not report one.
pub const DEFAULT_QUOTA_BYTES: usize = 102_400;

/// Usage ratio above which [`UsageQuotaGuard`] starts warning.
pub const DEFAULT_WARN_RATIO: f64 = 0.8;

/// Inspects a pending write and returns a warning, if any.
#[async_trait]
pub trait QuotaGuard: Send + Sync {
    async fn quota_warning(&self, storage: &Storage, key: &str, value: &str) -> Result<Option<String>>;
}

/// Guard that never warns.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQuotaGuard;

#[async_trait]
impl QuotaGuard for NoQuotaGuard {
    async fn quota_warning(&self, _storage: &Storage, _key: &str, _value: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Warns when a write would push the area's usage past a ratio of its quota.
#[derive(Debug, Clone, Copy)]
pub struct UsageQuotaGuard {
    warn_ratio: f64,
    fallback_quota: usize,
}

impl Default for UsageQuotaGuard {
    fn default() -> Self {
        Self {
            warn_ratio: DEFAULT_WARN_RATIO,
            fallback_quota: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl UsageQuotaGuard {
    pub fn new(warn_ratio: f64, fallback_quota: usize) -> Self {
        Self { warn_ratio, fallback_quota }
    }
}

#[async_trait]
impl QuotaGuard for UsageQuotaGuard {
    async fn quota_warning(&self, storage: &Storage, key: &str, value: &str) -> Result<Option<String>> {
        // managed storage is read-only for extensions
        if storage.area() == AreaName::Managed {
            return Ok(None);
        }
        let Some(client) = storage.primary_client() else {
            return Ok(None);
        };

        let quota = client.quota_bytes().unwrap_or(self.fallback_quota);
        let (in_use, current) = futures::try_join!(client.bytes_in_use(), client.get(Keys::one(key)))?;

        let previous = current.get(key).map_or(0, |v| key.len() + v.len());
        let projected = (in_use + key.len() + value.len()).saturating_sub(previous);
        if quota == 0 {
            return Ok((projected > 0).then(|| format!("storage quota would be exceeded: {projected}/0 bytes")));
        }
        let usage = projected as f64 / quota as f64;

        let warning = if usage > 1.0 {
            Some(format!("storage quota would be exceeded: {projected}/{quota} bytes"))
        } else if usage > self.warn_ratio {
            Some(format!(
                "storage quota is almost full: {projected}/{quota} bytes ({:.1}%)",
                usage * 100.0
            ))
        } else {
            None
        };
        Ok(warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageOptions;
    use crate::storage::{InMemoryExtensionStorage, StaticHost};
    use std::sync::Arc;

    fn storage_with_quota(area: AreaName, quota: usize) -> Storage {
        let engine = InMemoryExtensionStorage::new().with_quota(area, quota);
        let host = StaticHost::new().with_extension(Arc::new(engine));
        Storage::new(Arc::new(host), StorageOptions { area, ..Default::default() })
    }

    #[tokio::test]
    async fn small_write_has_no_warning() {
        let storage = storage_with_quota(AreaName::Sync, 1000);
        let w = UsageQuotaGuard::default().quota_warning(&storage, "k", "v").await.unwrap();
        assert_eq!(w, None);
    }

    #[tokio::test]
    async fn nearly_full_write_warns() {
        let storage = storage_with_quota(AreaName::Sync, 100);
        let value = "x".repeat(85);
        let w = UsageQuotaGuard::default().quota_warning(&storage, "k", &value).await.unwrap();
        assert!(w.unwrap().contains("almost full: 86/100"));
    }

    #[tokio::test]
    async fn overflowing_write_reports_exceeded() {
        let storage = storage_with_quota(AreaName::Local, 10);
        let w = UsageQuotaGuard::default().quota_warning(&storage, "k", "0123456789").await.unwrap();
        assert!(w.unwrap().contains("would be exceeded"));
    }

    #[tokio::test]
    async fn overwrite_discounts_previous_value() {
        let storage = storage_with_quota(AreaName::Sync, 100);
        storage.raw_set("k", &"x".repeat(80)).await.unwrap();

        // 1 + 80 in use; replacing with a value of the same size stays at 81
        let w = UsageQuotaGuard::new(0.9, 100)
            .quota_warning(&storage, "k", &"y".repeat(80))
            .await
            .unwrap();
        assert_eq!(w, None);
    }

    #[tokio::test]
    async fn zero_quota_is_exceeded_by_any_byte() {
        let storage = storage_with_quota(AreaName::Local, 0);

        let w = UsageQuotaGuard::default().quota_warning(&storage, "k", "").await.unwrap();
        assert!(w.unwrap().contains("would be exceeded: 1/0"));

        let w = UsageQuotaGuard::default().quota_warning(&storage, "", "").await.unwrap();
        assert_eq!(w, None);
    }

    #[tokio::test]
    async fn managed_area_is_skipped() {
        let storage = storage_with_quota(AreaName::Managed, 1);
        let w = UsageQuotaGuard::default().quota_warning(&storage, "k", "large").await.unwrap();
        assert_eq!(w, None);
    }

    #[tokio::test]
    async fn fallback_quota_applies_without_engine_quota() {
        let host = StaticHost::new().with_extension(Arc::new(InMemoryExtensionStorage::new()));
        let storage = Storage::new(Arc::new(host), StorageOptions::default());
        let w = UsageQuotaGuard::new(0.4, 10).quota_warning(&storage, "k", "1234").await.unwrap();
        assert!(w.unwrap().contains("almost full: 5/10"));
    }
}
