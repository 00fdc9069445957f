use thiserror::Error;

use crate::session::TransitionError;

/// Failures reported by the opaque network, cover-traffic and cipher
/// capabilities. The capability owns the message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("client operation failed: {0}")]
    Operation(String),
    #[error("client operation timed out after {0} ms")]
    Timeout(u64),
    #[error("invalid client parameters: {0}")]
    InvalidParams(String),
}

/// Session bring-up failures. The controller records these as the `Failed`
/// status plus a message; they are never raised to observers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("client creation failed: {0}")]
    ClientCreate(ClientError),
    #[error("client load failed: {0}")]
    ClientLoad(ClientError),
    #[error("network not ready: {0}")]
    NetworkTimeout(ClientError),
    #[error("local-data cipher derivation failed: {0}")]
    CipherDerivation(ClientError),
    #[error("cover traffic failed: {0}")]
    CoverTraffic(ClientError),
    #[error("storage reset failed: {0}")]
    Reset(String),
    #[error("attempt {0} was superseded by a newer password")]
    Superseded(u64),
    #[error("client handle not available")]
    NotReady,
    #[error("only {registered}/{total} nodes registered before the deadline")]
    RegistrationTimeout { registered: u32, total: u32 },
    #[error(transparent)]
    Transition(#[from] TransitionError),
}
