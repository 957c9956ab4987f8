//! Key/value persistence used by the vault and the whitelist cache.
//!
//! This core only defines the key formats; the medium is pluggable. Values
//! are opaque strings (base64 envelopes, JSON arrays).

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::{init_db, DbPool, SqliteStore};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Async string key/value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or overwrite.
    async fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Returns whether a value was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;
}

/// Shared store handle for use across the application.
pub type SharedStore = Arc<dyn KeyValueStore>;
