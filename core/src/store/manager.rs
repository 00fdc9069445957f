//! Process-wide persistent store with single-flight lazy initialisation.
//!
//! The first caller of [`StoreManager::store`] triggers `StoreBackend::open`;
//! every caller arriving before that open completes awaits the same pending
//! future. A successful open is kept for the rest of the manager's lifetime.
//! A failed open is handed to everyone who was waiting on it and then
//! forgotten, so the next access retries.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use super::traits::{KvStore, StoreBackend};
use crate::error::StoreError;

type PendingStore = Shared<BoxFuture<'static, Result<Arc<dyn KvStore>, StoreError>>>;

enum InitState {
    Uninitialized,
    Initializing(PendingStore),
    Ready(Arc<dyn KvStore>),
}

/// Observable initialisation state of a [`StoreManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Clone)]
pub struct StoreManager {
    inner: Arc<StoreManagerInner>,
}

struct StoreManagerInner {
    backend: Arc<dyn StoreBackend>,
    state: Mutex<InitState>,
}

impl StoreManager {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            inner: Arc::new(StoreManagerInner {
                backend,
                state: Mutex::new(InitState::Uninitialized),
            }),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.inner.backend.name()
    }

    pub fn status(&self) -> StoreStatus {
        match &*self.lock_state() {
            InitState::Uninitialized => StoreStatus::Uninitialized,
            InitState::Initializing(_) => StoreStatus::Initializing,
            InitState::Ready(_) => StoreStatus::Ready,
        }
    }

    /// Get or create the shared store instance.
    pub async fn store(&self) -> Result<Arc<dyn KvStore>, StoreError> {
        let pending = {
            let mut state = self.lock_state();
            match &*state {
                InitState::Ready(store) => return Ok(Arc::clone(store)),
                InitState::Initializing(pending) => pending.clone(),
                InitState::Uninitialized => {
                    let backend = Arc::clone(&self.inner.backend);
                    tracing::debug!(backend = backend.name(), "opening persistent store");
                    let pending = async move { backend.open().await }.boxed().shared();
                    *state = InitState::Initializing(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut state = self.lock_state();
        let is_current = matches!(&*state, InitState::Initializing(p) if p.ptr_eq(&pending));
        match &result {
            Ok(store) if is_current => {
                tracing::info!(backend = self.inner.backend.name(), "persistent store ready");
                *state = InitState::Ready(Arc::clone(store));
            }
            Err(e) if is_current => {
                tracing::warn!(
                    backend = self.inner.backend.name(),
                    "persistent store unavailable: {}",
                    e
                );
                *state = InitState::Uninitialized;
            }
            _ => {}
        }
        result
    }

    /// Read a value; `Ok(None)` when the key is unset.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store().await?.get(key).await
    }

    pub async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store().await?.set(key, value).await
    }

    pub async fn delete_value(&self, key: &str) -> Result<(), StoreError> {
        self.store().await?.delete(key).await
    }

    pub async fn keys(&self) -> Result<BTreeSet<String>, StoreError> {
        self.store().await?.keys().await
    }

    /// Clear all persistent storage (logout/reset).
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store().await?.clear().await
    }

    fn lock_state(&self) -> MutexGuard<'_, InitState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
