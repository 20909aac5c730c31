use crate::config::AreaName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use uuid::Uuid;

/// A single key's change as the primary engine reports it (raw strings).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChange {
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Changed keys of one engine-level notification, keyed by physical key.
pub type ChangeBatch = BTreeMap<String, RawChange>;

/// One engine-level notification: the area it happened in and what changed.
#[derive(Clone, Debug)]
pub struct StorageEvent {
    pub area: AreaName,
    pub changes: ChangeBatch,
}

/// A change after it went through the value codec. Delivered to watch callbacks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StorageChange {
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

/// Handle of a listener installed on a [`ChangeHub`](super::area::ChangeHub).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
