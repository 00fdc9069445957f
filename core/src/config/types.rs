use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub registration: RegistrationConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "haven_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persistent store and the legacy flat storage.
    /// Empty means "use the haven data directory".
    #[serde(default)]
    pub data_dir: String,

    #[serde(default = "default_kv_file")]
    pub kv_file: String,

    #[serde(default = "default_legacy_file")]
    pub legacy_file: String,

    /// Opaque path handed to the network client for its own state.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

fn default_kv_file() -> String {
    "kv.json".to_string()
}

fn default_legacy_file() -> String {
    "legacy.json".to_string()
}

fn default_state_path() -> String {
    "haven-state".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            kv_file: default_kv_file(),
            legacy_file: default_legacy_file(),
            state_path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on waiting for the network to report ready.
    #[serde(default = "default_network_wait_timeout_ms")]
    pub network_wait_timeout_ms: u64,

    #[serde(default = "default_follower_timeout_ms")]
    pub follower_timeout_ms: u64,

    #[serde(default = "default_max_payload_block_size")]
    pub max_payload_block_size: usize,

    #[serde(default)]
    pub cover_traffic: CoverTrafficConfig,
}

fn default_network_wait_timeout_ms() -> u64 {
    10 * 60 * 1000
}

fn default_follower_timeout_ms() -> u64 {
    3_000
}

fn default_max_payload_block_size() -> usize {
    725
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            network_wait_timeout_ms: default_network_wait_timeout_ms(),
            follower_timeout_ms: default_follower_timeout_ms(),
            max_payload_block_size: default_max_payload_block_size(),
            cover_traffic: CoverTrafficConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn network_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.network_wait_timeout_ms)
    }

    pub fn follower_timeout(&self) -> Duration {
        Duration::from_millis(self.follower_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverTrafficConfig {
    #[serde(default = "default_max_messages_per_cycle")]
    pub max_messages_per_cycle: u32,

    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,

    #[serde(default = "default_cycle_upper_bound_ms")]
    pub cycle_upper_bound_ms: u64,
}

fn default_max_messages_per_cycle() -> u32 {
    3
}

fn default_send_delay_ms() -> u64 {
    15_000
}

fn default_cycle_upper_bound_ms() -> u64 {
    7_000
}

impl Default for CoverTrafficConfig {
    fn default() -> Self {
        Self {
            max_messages_per_cycle: default_max_messages_per_cycle(),
            send_delay_ms: default_send_delay_ms(),
            cycle_upper_bound_ms: default_cycle_upper_bound_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_fast_period_ms")]
    pub fast_period_ms: u64,

    #[serde(default = "default_slow_period_ms")]
    pub slow_period_ms: u64,
}

fn default_fast_period_ms() -> u64 {
    1_000
}

fn default_slow_period_ms() -> u64 {
    60_000
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            fast_period_ms: default_fast_period_ms(),
            slow_period_ms: default_slow_period_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Fraction of known nodes that must be registered before the
    /// identity is considered ready.
    #[serde(default = "default_readiness_threshold")]
    pub readiness_threshold: f64,

    #[serde(default = "default_registration_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_readiness_threshold() -> f64 {
    0.8
}

fn default_registration_timeout_ms() -> u64 {
    10 * 60 * 1000
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            readiness_threshold: default_readiness_threshold(),
            timeout_ms: default_registration_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkConfig {
    Loopback(LoopbackNetworkConfig),
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::Loopback(LoopbackNetworkConfig::default())
    }
}

/// Knobs for the in-process network simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopbackNetworkConfig {
    /// Delay before `wait_for_network` reports ready.
    #[serde(default = "default_ready_after_ms")]
    pub ready_after_ms: u64,

    #[serde(default = "default_total_nodes")]
    pub total_nodes: u32,

    /// Nodes that finish registering per registration poll.
    #[serde(default = "default_nodes_per_poll")]
    pub nodes_per_poll: u32,
}

fn default_ready_after_ms() -> u64 {
    200
}

fn default_total_nodes() -> u32 {
    10
}

fn default_nodes_per_poll() -> u32 {
    2
}

impl Default for LoopbackNetworkConfig {
    fn default() -> Self {
        Self {
            ready_after_ms: default_ready_after_ms(),
            total_nodes: default_total_nodes(),
            nodes_per_poll: default_nodes_per_poll(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.session.network_wait_timeout_ms, 600_000);
        assert_eq!(cfg.session.cover_traffic, CoverTrafficConfig::default());
        assert_eq!(cfg.storage.kv_file, "kv.json");
        assert!(matches!(cfg.network, NetworkConfig::Loopback(_)));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [tracking]
            slow_period_ms = 30000

            [network]
            kind = "loopback"
            ready_after_ms = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.tracking.slow_period_ms, 30_000);
        assert_eq!(cfg.tracking.fast_period_ms, 1_000);
        let NetworkConfig::Loopback(lb) = cfg.network;
        assert_eq!(lb.ready_after_ms, 5);
        assert_eq!(lb.total_nodes, 10);
    }
}
