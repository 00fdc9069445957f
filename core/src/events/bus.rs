//! In-process publish/subscribe over a closed set of topics.
//!
//! Dispatch is synchronous and follows registration order. Events are not
//! buffered: a listener only sees emissions that happen while it is
//! registered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::oneshot;

use super::types::{AppEvent, Topic};

pub type Listener = Arc<dyn Fn(&AppEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<Topic, Vec<(ListenerId, Listener)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, topic: Topic, handler: F) -> ListenerId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        tracing::debug!(%topic, ?id, "listener added");
        id
    }

    /// Returns `false` when `id` was not registered for `topic`.
    pub fn remove_listener(&self, topic: Topic, id: ListenerId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = listeners.get_mut(&topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(&topic);
        }
        removed
    }

    /// Register a listener that stays registered until the guard drops.
    pub fn listen<F>(&self, topic: Topic, handler: F) -> ListenerGuard
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        let id = self.add_listener(topic, handler);
        ListenerGuard {
            bus: self.clone(),
            topic,
            id,
            armed: true,
        }
    }

    /// Deliver `event` to every listener of its topic. Listeners may add or
    /// remove listeners while being called; changes apply to later emits.
    pub fn emit(&self, event: AppEvent) -> usize {
        let topic = event.topic();
        let snapshot: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        tracing::debug!(%topic, listeners = snapshot.len(), "emit");
        for listener in &snapshot {
            listener(&event);
        }
        snapshot.len()
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .map_or(0, Vec::len)
    }

    /// Resolve with the next event emitted on `topic`.
    pub async fn next(&self, topic: Topic) -> Option<AppEvent> {
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        let _guard = self.listen(topic, move |event| {
            if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(event.clone());
            }
        });
        rx.await.ok()
    }
}

/// Unregisters its listener on drop.
pub struct ListenerGuard {
    bus: EventBus,
    topic: Topic,
    id: ListenerId,
    armed: bool,
}

impl ListenerGuard {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Keep the listener registered for the rest of the bus's life.
    pub fn forget(mut self) -> ListenerId {
        self.armed = false;
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if self.armed {
            self.bus.remove_listener(self.topic, self.id);
        }
    }
}
