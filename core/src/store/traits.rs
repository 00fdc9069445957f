use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

/// Asynchronous string key/value store.
///
/// Keys are opaque namespaced strings and values are opaque strings (usually
/// JSON). `get` returns `Ok(None)` for an unset key, which is distinct from
/// an empty string.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<BTreeSet<String>, StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Opens the durable backend behind a [`KvStore`].
///
/// Called by [`super::StoreManager`] at most once per successful
/// initialisation; a failed open is retried on the next access.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn open(&self) -> Result<Arc<dyn KvStore>, StoreError>;
}

/// Synchronous flat key/value storage that predates [`KvStore`].
///
/// Source of the one-shot migration and of the signup flag.
pub trait LegacyStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}
