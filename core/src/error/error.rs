use thiserror::Error;

/// Failures of the persistent key/value store and the legacy flat storage.
///
/// `Clone` because a single pending store initialisation is shared by every
/// caller waiting on it and each of them receives the same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("storage io error: {0}")]
    Io(String),
    #[error("storage serialization error: {0}")]
    Serialization(String),
    #[error("legacy storage error: {0}")]
    Legacy(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("persistent store could not be opened: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingError {
    #[error("setting '{key}' storage failure: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("setting '{key}' holds an undecodable value: {reason}")]
    Decode { key: String, reason: String },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("setting error: {0}")]
    Setting(#[from] SettingError),
    #[error("session failed: {0}")]
    Session(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
