//! Process-wide event bus that sequences storage, session and UI bring-up.

pub mod bus;
pub mod types;

pub use bus::{EventBus, Listener, ListenerGuard, ListenerId};
pub use types::{AppEvent, Topic};
