//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `haven_core::api` instead of reaching into internal modules.

pub use crate::capability::{
    ClientHandle, ClientParams, CoverTraffic, HealthCallback, LocalCipher, NetworkApi, Password,
};
pub use crate::config::{
    get_haven_data_dir, load_default, AppConfig, CoverTrafficConfig, LoggingConfig,
    LoopbackNetworkConfig, NetworkConfig, RegistrationConfig, SessionConfig, StorageConfig,
    TrackingConfig,
};
pub use crate::context::{AppContext, Services, ServicesFactory};
pub use crate::error::{
    CliError, ClientError, MigrationError, SessionError, SettingError, StoreError,
};
pub use crate::events::{AppEvent, EventBus, ListenerGuard, ListenerId, Topic};
pub use crate::migrate::{
    run_startup_migration, KeyFailure, MigrationReport, StorageMigrator, LEGACY_KEYS,
    MIGRATION_COMPLETED_KEY,
};
pub use crate::session::{
    InitState, NetworkStatus, RegistrationProgress, SessionController, SessionEvent,
    SessionOptions, SessionPhase, SessionSnapshot,
};
pub use crate::settings::{
    keys, AccountSync, AccountSyncService, AccountSyncStatus, ChannelFavorites, OptionalString,
    SettingReplica, SettingValue, TrackNetworkPeriod, TrackingMode, KNOWN_SETTINGS,
};
pub use crate::store::{
    KvStore, LegacyStorage, MemoryBackend, MemoryLegacyStorage, MemoryStore, StoreBackend,
    StoreManager, StoreStatus,
};
