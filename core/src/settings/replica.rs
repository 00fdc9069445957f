//! Typed, observable binding of one persistent-store key to an in-memory
//! value.
//!
//! Loading writes the default back when the key is unset, so every key that
//! has ever been read exists afterwards. Writes go to the store first; the
//! in-memory value only changes once the write succeeded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::value::SettingValue;
use crate::error::SettingError;
use crate::store::StoreManager;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaStatus {
    pub loading: bool,
    pub error: Option<SettingError>,
}

struct ReplicaState {
    loading: bool,
    error: Option<SettingError>,
}

struct ReplicaInner<T> {
    store: StoreManager,
    key: String,
    default: T,
    state: Mutex<ReplicaState>,
    value_tx: watch::Sender<T>,
}

/// Cloning yields another view of the same replica.
pub struct SettingReplica<T: SettingValue> {
    inner: Arc<ReplicaInner<T>>,
}

impl<T: SettingValue> Clone for SettingReplica<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: SettingValue> SettingReplica<T> {
    /// Create an unloaded replica holding `default`.
    pub fn new(store: StoreManager, key: impl Into<String>, default: T) -> Self {
        let (value_tx, _) = watch::channel(default.clone());
        Self {
            inner: Arc::new(ReplicaInner {
                store,
                key: key.into(),
                default,
                state: Mutex::new(ReplicaState {
                    loading: true,
                    error: None,
                }),
                value_tx,
            }),
        }
    }

    /// Create a replica and await its initial load.
    pub async fn open(store: StoreManager, key: impl Into<String>, default: T) -> Self {
        let replica = Self::new(store, key, default);
        replica.load().await;
        replica
    }

    /// Create a replica whose initial load runs in the background.
    pub fn spawn(
        store: StoreManager,
        key: impl Into<String>,
        default: T,
    ) -> (Self, JoinHandle<()>) {
        let replica = Self::new(store, key, default);
        let loader = replica.clone();
        let handle = tokio::spawn(async move { loader.load().await });
        (replica, handle)
    }

    pub fn value(&self) -> T {
        self.inner.value_tx.borrow().clone()
    }

    pub fn status(&self) -> ReplicaStatus {
        let state = self.lock_state();
        ReplicaStatus {
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().loading
    }

    pub fn error(&self) -> Option<SettingError> {
        self.lock_state().error.clone()
    }

    /// Receiver that observes every accepted value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.inner.value_tx.subscribe()
    }

    /// Load from the store, writing the default back when the key is unset.
    /// Errors are surfaced through [`Self::error`]; the value is then left
    /// unchanged.
    pub async fn load(&self) {
        let key = self.inner.key.as_str();
        let result = match self.inner.store.get_value(key).await {
            Ok(Some(raw)) => T::decode(&raw).map_err(|reason| SettingError::Decode {
                key: key.to_string(),
                reason,
            }),
            Ok(None) => {
                tracing::debug!(key, "setting unset, writing default");
                self.inner
                    .store
                    .set_value(key, &self.inner.default.encode())
                    .await
                    .map(|_| self.inner.default.clone())
                    .map_err(|source| SettingError::Store {
                        key: key.to_string(),
                        source,
                    })
            }
            Err(source) => Err(SettingError::Store {
                key: key.to_string(),
                source,
            }),
        };

        match result {
            Ok(value) => {
                self.inner.value_tx.send_replace(value);
                self.finish_load(None);
            }
            Err(e) => {
                tracing::warn!("setting load failed: {}", e);
                self.finish_load(Some(e));
            }
        }
    }

    /// Re-read the stored value, picking up writes made by other replicas.
    pub async fn reload(&self) {
        self.lock_state().loading = true;
        self.load().await;
    }

    /// Write through to the store; the in-memory value changes only after
    /// the write succeeded.
    pub async fn set_value(&self, value: T) -> Result<(), SettingError> {
        let key = self.inner.key.as_str();
        match self.inner.store.set_value(key, &value.encode()).await {
            Ok(()) => {
                self.inner.value_tx.send_replace(value);
                Ok(())
            }
            Err(source) => {
                let err = SettingError::Store {
                    key: key.to_string(),
                    source,
                };
                tracing::warn!("setting write failed: {}", err);
                self.lock_state().error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn finish_load(&self, error: Option<SettingError>) {
        let mut state = self.lock_state();
        state.loading = false;
        state.error = error;
    }

    fn lock_state(&self) -> MutexGuard<'_, ReplicaState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
