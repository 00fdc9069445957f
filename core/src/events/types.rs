use std::fmt;
use std::sync::Arc;

use crate::capability::{ClientHandle, Password};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// The persistent store backend finished opening.
    StorageReady,
    /// The user's password was decrypted; gates session bring-up.
    PasswordDecrypted,
    /// A client handle was loaded.
    ClientLoaded,
    /// The channel manager came up; gates database bring-up.
    ChannelManagerLoaded,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StorageReady => "storage_ready",
            Self::PasswordDecrypted => "password_decrypted",
            Self::ClientLoaded => "client_loaded",
            Self::ChannelManagerLoaded => "channel_manager_loaded",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub enum AppEvent {
    StorageReady { backend: String },
    PasswordDecrypted(Password),
    ClientLoaded(Arc<dyn ClientHandle>),
    ChannelManagerLoaded,
}

impl AppEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::StorageReady { .. } => Topic::StorageReady,
            Self::PasswordDecrypted(_) => Topic::PasswordDecrypted,
            Self::ClientLoaded(_) => Topic::ClientLoaded,
            Self::ChannelManagerLoaded => Topic::ChannelManagerLoaded,
        }
    }
}

impl fmt::Debug for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageReady { backend } => {
                f.debug_struct("StorageReady").field("backend", backend).finish()
            }
            Self::PasswordDecrypted(pw) => f.debug_tuple("PasswordDecrypted").field(pw).finish(),
            Self::ClientLoaded(handle) => f
                .debug_struct("ClientLoaded")
                .field("client_id", &handle.id())
                .finish(),
            Self::ChannelManagerLoaded => f.write_str("ChannelManagerLoaded"),
        }
    }
}
