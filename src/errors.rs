use crate::config::StorageConfigError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Quota exceeded while writing {key:?}: {bytes} bytes > {quota} bytes")]
    QuotaExceeded {
        key: String,
        bytes: usize,
        quota: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(#[from] StorageConfigError),

    #[error("Sqlite error: {0}")]
    Sqlite(String),

    #[error("Backend error: {0}")]
    Backend(anyhow::Error),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Engines report through anyhow; a StorageError carried inside (like QuotaExceeded)
// is handed back to the caller unaltered.
impl From<anyhow::Error> for StorageError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<StorageError>() {
            Ok(inner) => inner,
            Err(other) => StorageError::Backend(other),
        }
    }
}

#[cfg(feature = "sqlite_web_storage")]
impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Sqlite(err.to_string())
    }
}

#[cfg(feature = "sqlite_web_storage")]
impl From<r2d2_sqlite::rusqlite::Error> for StorageError {
    fn from(err: r2d2_sqlite::rusqlite::Error) -> Self {
        StorageError::Sqlite(err.to_string())
    }
}
