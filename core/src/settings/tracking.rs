use std::fmt;
use std::time::Duration;

use super::keys;
use super::replica::SettingReplica;
use super::value::SettingValue;
use crate::config::TrackingConfig;
use crate::error::SettingError;
use crate::store::StoreManager;

/// How often the client polls the network for updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackingMode {
    #[default]
    Fast,
    Slow,
}

impl TrackingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Fast => Self::Slow,
            Self::Slow => Self::Fast,
        }
    }

    pub fn period(self, cfg: &TrackingConfig) -> Duration {
        match self {
            Self::Fast => Duration::from_millis(cfg.fast_period_ms),
            Self::Slow => Duration::from_millis(cfg.slow_period_ms),
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything but `slow` reads as fast.
impl SettingValue for TrackingMode {
    fn encode(&self) -> String {
        self.as_str().to_string()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        Ok(if raw == "slow" { Self::Slow } else { Self::Fast })
    }
}

#[derive(Clone)]
pub struct TrackNetworkPeriod {
    replica: SettingReplica<TrackingMode>,
    cfg: TrackingConfig,
}

impl TrackNetworkPeriod {
    pub async fn open(store: StoreManager, cfg: TrackingConfig) -> Self {
        Self {
            replica: SettingReplica::open(store, keys::TRACK_NETWORK_PERIOD, TrackingMode::Fast)
                .await,
            cfg,
        }
    }

    pub fn mode(&self) -> TrackingMode {
        self.replica.value()
    }

    pub fn period(&self) -> Duration {
        self.mode().period(&self.cfg)
    }

    pub async fn set_mode(&self, mode: TrackingMode) -> Result<(), SettingError> {
        self.replica.set_value(mode).await
    }

    pub async fn toggle(&self) -> Result<TrackingMode, SettingError> {
        let next = self.mode().toggled();
        self.set_mode(next).await?;
        Ok(next)
    }

    pub fn replica(&self) -> &SettingReplica<TrackingMode> {
        &self.replica
    }
}
