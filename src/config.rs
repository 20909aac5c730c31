//! Storage configuration.
//!
//! [`StorageOptions`] controls how a single [`Storage`](crate::storage::Storage)
//! instance binds to the primary (extension) engine and which keys it mirrors
//! into the secondary (web) engine.
//!
//! `StorageOptions` provides defaults via [`Default`] and a fluent
//! [`StorageOptions::builder()`] with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use ext_storage::config::{AreaName, StorageOptions};
//! let opts = StorageOptions::default();
//! assert_eq!(opts.area, AreaName::Sync);
//! assert!(!opts.all_copied);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use ext_storage::config::{AreaName, StorageOptions};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let opts = StorageOptions::builder()
//!     .area(AreaName::Local)
//!     .unlimited(true)
//!     .copied_keys(["theme", "locale"])
//!     .build()?; // returns Result<StorageOptions, StorageConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `area`: Partition of the primary engine to bind to (default: `sync`).
//! - `unlimited`: Skip the quota check on writes (default: `false`).
//! - `all_copied`: Mirror every key into the secondary engine (default: `false`).
//! - `copied_key_list`: Logical keys eligible for mirroring (default: empty).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Partition of the primary engine.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AreaName {
    /// Synchronised across the user's devices by the engine. Small quota.
    #[default]
    Sync,
    /// Local to this device.
    Local,
    /// Read-only, provisioned by an administrator.
    Managed,
    /// In memory for the lifetime of the session.
    Session,
}

impl AreaName {
    pub const ALL: [AreaName; 4] = [AreaName::Sync, AreaName::Local, AreaName::Managed, AreaName::Session];

    pub fn as_str(&self) -> &'static str {
        match self {
            AreaName::Sync => "sync",
            AreaName::Local => "local",
            AreaName::Managed => "managed",
            AreaName::Session => "session",
        }
    }
}

impl fmt::Display for AreaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaName {
    type Err = StorageConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AreaName::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| StorageConfigError::UnknownArea(s.to_string()))
    }
}

impl TryFrom<String> for AreaName {
    type Error = StorageConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Construction options for a storage instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageOptions {
    pub area: AreaName,
    pub unlimited: bool,
    pub all_copied: bool,
    pub copied_key_list: Vec<String>,
}

impl StorageOptions {
    pub fn builder() -> StorageOptionsBuilder {
        StorageOptionsBuilder::default()
    }

    /// Parses options from their JSON form, e.g. `{"area":"local","allCopied":true}`.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        // an unknown area is a configuration error, not a malformed document
        if let Some(area) = raw.get("area").and_then(serde_json::Value::as_str) {
            area.parse::<AreaName>()?;
        }
        let opts: StorageOptions = serde_json::from_value(raw)?;
        validate(&opts)?;
        Ok(opts)
    }

    /// Whether any key may end up in the secondary engine.
    pub fn mirrors_anything(&self) -> bool {
        self.all_copied || !self.copied_key_list.is_empty()
    }
}

/// Builder for [`StorageOptions`].
#[derive(Debug, Clone, Default)]
pub struct StorageOptionsBuilder {
    inner: StorageOptions,
}

impl StorageOptionsBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut StorageOptions)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn area(self, area: AreaName) -> Self { self.map(|o| o.area = area) }
    pub fn unlimited(self, on: bool) -> Self { self.map(|o| o.unlimited = on) }
    pub fn all_copied(self, on: bool) -> Self { self.map(|o| o.all_copied = on) }
    pub fn copied_key<S: Into<String>>(self, key: S) -> Self { self.map(|o| o.copied_key_list.push(key.into())) }
    pub fn copied_keys<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map(|o| o.copied_key_list.extend(keys.into_iter().map(Into::into)))
    }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut StorageOptions)) -> Self { self.map(f) }

    /// Validate and build the final options.
    pub fn build(self) -> Result<StorageOptions, StorageConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfigError {
    UnknownArea(String),
    EmptyCopiedKey { index: usize },
}

impl fmt::Display for StorageConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageConfigError::UnknownArea(name) =>
                write!(f, "unknown storage area {name:?} (expected sync, local, managed or session)"),
            StorageConfigError::EmptyCopiedKey { index } =>
                write!(f, "copied_key_list[{index}] is empty"),
        }
    }
}
impl std::error::Error for StorageConfigError {}

fn validate(o: &StorageOptions) -> Result<(), StorageConfigError> {
    if let Some(index) = o.copied_key_list.iter().position(|k| k.is_empty()) {
        return Err(StorageConfigError::EmptyCopiedKey { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_extension_conventions() {
        let o = StorageOptions::default();
        assert_eq!(o.area, AreaName::Sync);
        assert!(!o.unlimited);
        assert!(!o.all_copied);
        assert!(o.copied_key_list.is_empty());
        assert!(!o.mirrors_anything());
    }

    #[test]
    fn builder_collects_keys() {
        let o = StorageOptions::builder()
            .area(AreaName::Session)
            .copied_key("a")
            .copied_keys(vec!["b", "c"])
            .build()
            .unwrap();
        assert_eq!(o.area, AreaName::Session);
        assert_eq!(o.copied_key_list, vec!["a", "b", "c"]);
        assert!(o.mirrors_anything());
    }

    #[test]
    fn builder_rejects_empty_key() {
        let err = StorageOptions::builder()
            .copied_keys(["ok", ""])
            .build()
            .unwrap_err();
        assert_eq!(err, StorageConfigError::EmptyCopiedKey { index: 1 });
    }

    #[test]
    fn area_names_parse_and_display() {
        for area in AreaName::ALL {
            assert_eq!(area.to_string().parse::<AreaName>().unwrap(), area);
        }
        assert!(matches!(
            "cloud".parse::<AreaName>(),
            Err(StorageConfigError::UnknownArea(_))
        ));
    }

    #[test]
    fn options_from_json_use_camel_case_and_defaults() {
        let o = StorageOptions::from_json(r#"{"area":"local","allCopied":true}"#).unwrap();
        assert_eq!(o.area, AreaName::Local);
        assert!(o.all_copied);
        assert!(!o.unlimited);

        let o = StorageOptions::from_json(r#"{"copiedKeyList":["x"]}"#).unwrap();
        assert_eq!(o.area, AreaName::Sync);
        assert_eq!(o.copied_key_list, vec!["x"]);
    }

    #[test]
    fn options_from_json_validates() {
        assert!(matches!(
            StorageOptions::from_json(r#"{"copiedKeyList":[""]}"#),
            Err(crate::StorageError::Config(StorageConfigError::EmptyCopiedKey { index: 0 }))
        ));
        match StorageOptions::from_json(r#"{"area":"cloud"}"#) {
            Err(crate::StorageError::Config(StorageConfigError::UnknownArea(name))) => assert_eq!(name, "cloud"),
            other => panic!("expected UnknownArea, got {other:?}"),
        }
        assert!(matches!(
            StorageOptions::from_json(r#"{"area":"#),
            Err(crate::StorageError::Serialization(_))
        ));
    }

    #[test]
    fn area_name_serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&AreaName::Session).unwrap(), r#""session""#);
        assert_eq!(serde_json::from_str::<AreaName>(r#""managed""#).unwrap(), AreaName::Managed);
        let err = serde_json::from_str::<AreaName>(r#""cloud""#).unwrap_err();
        assert!(err.to_string().contains("unknown storage area"));
    }
}
