use super::keys;
use super::replica::SettingReplica;
use super::value::SettingValue;
use crate::error::SettingError;
use crate::store::StoreManager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountSyncStatus {
    #[default]
    NotSynced,
    Synced,
    Ignored,
}

impl AccountSyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotSynced => "NotSynced",
            Self::Synced => "Synced",
            Self::Ignored => "Ignored",
        }
    }
}

impl SettingValue for AccountSyncStatus {
    fn encode(&self) -> String {
        self.as_str().to_string()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        match raw {
            "NotSynced" => Ok(Self::NotSynced),
            "Synced" => Ok(Self::Synced),
            "Ignored" => Ok(Self::Ignored),
            other => Err(format!("unknown account sync status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountSyncService {
    #[default]
    None,
    Google,
    Dropbox,
}

impl AccountSyncService {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Google => "Google",
            Self::Dropbox => "Dropbox",
        }
    }
}

impl SettingValue for AccountSyncService {
    fn encode(&self) -> String {
        self.as_str().to_string()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        match raw {
            "None" => Ok(Self::None),
            "Google" => Ok(Self::Google),
            "Dropbox" => Ok(Self::Dropbox),
            other => Err(format!("unknown account sync service '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct AccountSync {
    status: SettingReplica<AccountSyncStatus>,
    service: SettingReplica<AccountSyncService>,
}

impl AccountSync {
    pub async fn open(store: StoreManager) -> Self {
        let (status, service) = tokio::join!(
            SettingReplica::open(store.clone(), keys::ACCOUNT_SYNC, AccountSyncStatus::NotSynced),
            SettingReplica::open(store, keys::ACCOUNT_SYNC_SERVICE, AccountSyncService::None),
        );
        Self { status, service }
    }

    pub fn status(&self) -> AccountSyncStatus {
        self.status.value()
    }

    pub fn service(&self) -> AccountSyncService {
        self.service.value()
    }

    pub fn is_synced(&self) -> bool {
        self.status() == AccountSyncStatus::Synced
    }

    pub async fn set_status(&self, status: AccountSyncStatus) -> Result<(), SettingError> {
        self.status.set_value(status).await
    }

    pub async fn set_service(&self, service: AccountSyncService) -> Result<(), SettingError> {
        self.service.set_value(service).await
    }
}
