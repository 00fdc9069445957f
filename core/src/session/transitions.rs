//! Phase transition rules

use super::types::SessionPhase;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },
    #[error("cannot leave terminal phase {state} without a new attempt")]
    FromTerminalState { state: SessionPhase },
}

pub struct StateTransition;

impl StateTransition {
    /// Validate a transition within one attempt. Starting a new attempt is
    /// checked by [`Self::can_restart`] instead.
    pub fn validate(from: SessionPhase, to: SessionPhase) -> Result<(), TransitionError> {
        use SessionPhase::*;

        if Self::is_terminal(from) && !matches!(to, Disconnecting) {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = match (from, to) {
            (Idle, Resetting) | (Idle, Loading) => true,
            (Resetting, Creating) => true,
            (Creating, Loading) => true,
            (Loading, Connecting) => true,
            (Connecting, Connected) => true,

            // health signal flips
            (Connected, Disconnected) | (Disconnected, Connected) => true,

            (Resetting | Creating | Loading | Connecting, Failed) => true,

            (Idle | Disconnecting, Disconnecting) => false,
            (_, Disconnecting) => true,
            (Disconnecting, Idle) => true,

            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// A fresh password event may supersede any phase except an explicit
    /// teardown in progress.
    pub fn can_restart(from: SessionPhase) -> bool {
        !matches!(from, SessionPhase::Disconnecting)
    }

    /// Next phase on the success path.
    pub fn next_phase(current: SessionPhase) -> Option<SessionPhase> {
        match current {
            SessionPhase::Resetting => Some(SessionPhase::Creating),
            SessionPhase::Creating => Some(SessionPhase::Loading),
            SessionPhase::Loading => Some(SessionPhase::Connecting),
            SessionPhase::Connecting => Some(SessionPhase::Connected),
            SessionPhase::Disconnecting => Some(SessionPhase::Idle),
            _ => None,
        }
    }

    pub fn is_terminal(phase: SessionPhase) -> bool {
        matches!(phase, SessionPhase::Failed)
    }

    pub fn phase_description(phase: SessionPhase) -> &'static str {
        match phase {
            SessionPhase::Idle => "waiting for password",
            SessionPhase::Resetting => "clearing local state",
            SessionPhase::Creating => "creating client",
            SessionPhase::Loading => "loading client",
            SessionPhase::Connecting => "connecting to network",
            SessionPhase::Connected => "connected",
            SessionPhase::Disconnected => "network unhealthy",
            SessionPhase::Failed => "bring-up failed",
            SessionPhase::Disconnecting => "disconnecting",
        }
    }
}
