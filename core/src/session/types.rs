//! Session state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the bring-up state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No decrypted password observed yet
    Idle,
    /// Wiping local state before creating a fresh client
    Resetting,
    Creating,
    Loading,
    /// Following started, waiting for the network
    Connecting,
    Connected,
    /// Unhealthy; the client handle is kept
    Disconnected,
    /// Terminal for the current attempt
    Failed,
    /// Explicit user-triggered teardown
    Disconnecting,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resetting => "resetting",
            Self::Creating => "creating",
            Self::Loading => "loading",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InitState {
    Uninitialized,
    Creating,
    Created,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkStatus {
    Uninitialized,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl NetworkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable view of the controller's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub init_state: InitState,
    pub network_status: NetworkStatus,
    /// Attempt counter; bumped by every password event and by disconnect
    pub generation: u64,
    pub client_id: Option<i64>,
    pub has_cover_traffic: bool,
    pub cover_traffic_running: bool,
    pub has_cipher: bool,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            init_state: InitState::Uninitialized,
            network_status: NetworkStatus::Uninitialized,
            generation: 0,
            client_id: None,
            has_cover_traffic: false,
            cover_traffic_running: false,
            has_cipher: false,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

impl SessionSnapshot {
    pub fn has_client(&self) -> bool {
        self.client_id.is_some()
    }
}

/// Session events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    PhaseChanged {
        generation: u64,
        old_phase: SessionPhase,
        new_phase: SessionPhase,
        timestamp: DateTime<Utc>,
    },
    ClientLoaded {
        generation: u64,
        client_id: i64,
        timestamp: DateTime<Utc>,
    },
    Ready {
        generation: u64,
        client_id: i64,
        timestamp: DateTime<Utc>,
    },
    HealthChanged {
        generation: u64,
        healthy: bool,
        timestamp: DateTime<Utc>,
    },
    Failed {
        generation: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Disconnected {
        generation: u64,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::PhaseChanged { generation, .. }
            | Self::ClientLoaded { generation, .. }
            | Self::Ready { generation, .. }
            | Self::HealthChanged { generation, .. }
            | Self::Failed { generation, .. }
            | Self::Disconnected { generation, .. } => *generation,
        }
    }
}
