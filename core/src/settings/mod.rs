//! Typed application settings backed by the persistent store.

pub mod account_sync;
pub mod favorites;
pub mod replica;
pub mod tracking;
pub mod value;

pub use account_sync::{AccountSync, AccountSyncService, AccountSyncStatus};
pub use favorites::{ChannelFavorites, Favorites};
pub use replica::{ReplicaStatus, SettingReplica};
pub use tracking::{TrackNetworkPeriod, TrackingMode};
pub use value::{OptionalString, SettingValue};

use crate::store::StoreManager;

pub mod keys {
    /// `"true"` once a client has been created on this device.
    pub const CLIENT_INITIALIZED: &str = "cmixPreviouslyInitialized";
    pub const DMS_DATABASE_NAME: &str = "DMS_DATABASE_NAME";
    pub const ACCOUNT_SYNC: &str = "ACCOUNT_SYNC";
    pub const ACCOUNT_SYNC_SERVICE: &str = "ACCOUNT_SYNC_SERVICE";
    pub const TRACK_NETWORK_PERIOD: &str = "TRACK_NETWORK_PERIOD";
    pub const CHANNEL_FAVORITES: &str = "channel-favorites";
    pub const NOTIFICATION_SOUND: &str = "notification-sound";
    pub const CHANNELS_STORAGE_TAG: &str = "channels-storage-tag";
}

pub const DEFAULT_NOTIFICATION_SOUND: &str = "/sounds/notification.mp3";

/// Settings with a stable key and the raw value written on first read.
pub const KNOWN_SETTINGS: &[(&str, &str)] = &[
    (keys::TRACK_NETWORK_PERIOD, "fast"),
    (keys::ACCOUNT_SYNC, "NotSynced"),
    (keys::ACCOUNT_SYNC_SERVICE, "None"),
    (keys::CHANNEL_FAVORITES, "[]"),
    (keys::NOTIFICATION_SOUND, DEFAULT_NOTIFICATION_SOUND),
    (keys::CHANNELS_STORAGE_TAG, ""),
    (keys::DMS_DATABASE_NAME, ""),
];

pub fn default_for(key: &str) -> Option<&'static str> {
    KNOWN_SETTINGS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, default)| *default)
}

pub async fn notification_sound(store: StoreManager) -> SettingReplica<String> {
    SettingReplica::open(
        store,
        keys::NOTIFICATION_SOUND,
        DEFAULT_NOTIFICATION_SOUND.to_string(),
    )
    .await
}

/// Tag identifying the channel-manager storage; unset until a channel
/// manager has been created.
pub async fn channels_storage_tag(store: StoreManager) -> SettingReplica<OptionalString> {
    SettingReplica::open(store, keys::CHANNELS_STORAGE_TAG, OptionalString::default()).await
}

pub async fn dms_database_name(store: StoreManager) -> SettingReplica<OptionalString> {
    SettingReplica::open(store, keys::DMS_DATABASE_NAME, OptionalString::default()).await
}
