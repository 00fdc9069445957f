//! Durable key/value substrate shared by the migrator, the setting replicas
//! and the session controller.

pub mod manager;
pub mod memory;
pub mod traits;

pub use manager::{StoreManager, StoreStatus};
pub use memory::{MemoryBackend, MemoryLegacyStorage, MemoryStore};
pub use traits::{KvStore, LegacyStorage, StoreBackend};
