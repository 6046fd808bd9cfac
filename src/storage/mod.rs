//! Key-value document persistence.
//!
//! Every piece of persisted state (the user list, the current session and
//! each user's profile) is one JSON document stored under a string key.
//! Backends only move raw text; parsing and default recovery live in
//! [`load_document`].

mod file;
mod memory;
mod postgres;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn put(&self, key: &str, document: &str) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Read and parse the document under `key`.
///
/// A missing document and a document that does not parse as `T` both come
/// back as `Ok(None)`; the latter is logged and left for the caller to
/// replace with defaults. Only backend failures are returned as errors.
pub async fn load_document<T>(store: &dyn KvStore, key: &str) -> anyhow::Result<Option<T>>
where
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str::<T>(&raw) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            warn!(key, error = %e, "stored document failed to parse; falling back to defaults");
            Ok(None)
        }
    }
}

pub async fn save_document<T>(store: &dyn KvStore, key: &str, doc: &T) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(doc)?;
    store.put(key, &raw).await
}
