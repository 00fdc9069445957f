use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::params::ClientParams;
use super::password::Password;
use crate::config::CoverTrafficConfig;
use crate::error::ClientError;

pub type HealthCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Entry point into the network library.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    fn name(&self) -> &str;

    /// Network definition document for the default environment.
    async fn default_network_definition(&self) -> Result<String, ClientError>;

    fn default_params(&self) -> ClientParams;

    /// Create new client state under `storage_path`, encrypted with
    /// `password`.
    async fn create_client(
        &self,
        ndf: &str,
        storage_path: &str,
        password: &Password,
        registration_code: &str,
    ) -> Result<(), ClientError>;

    async fn load_client(
        &self,
        storage_path: &str,
        password: &Password,
        params: &ClientParams,
    ) -> Result<Arc<dyn ClientHandle>, ClientError>;

    async fn new_cover_traffic(
        &self,
        client_id: i64,
        config: &CoverTrafficConfig,
    ) -> Result<Arc<dyn CoverTraffic>, ClientError>;

    async fn new_cipher(
        &self,
        client_id: i64,
        password: &Password,
        max_payload_block_size: usize,
    ) -> Result<Arc<dyn LocalCipher>, ClientError>;
}

/// A loaded client.
#[async_trait]
pub trait ClientHandle: Send + Sync {
    fn id(&self) -> i64;

    fn start_following(&self, follower_timeout: Duration) -> Result<(), ClientError>;

    /// Resolve once the network is healthy, or fail after `timeout`.
    async fn wait_for_network(&self, timeout: Duration) -> Result<(), ClientError>;

    fn stop_following(&self) -> Result<(), ClientError>;

    fn add_health_callback(&self, callback: HealthCallback);

    fn set_tracking_period(&self, period: Duration);

    /// `(registered, total)` gateway node counts.
    async fn node_registration_status(&self) -> Result<(u32, u32), ClientError>;
}

pub trait CoverTraffic: Send + Sync {
    fn start(&self) -> Result<(), ClientError>;
    fn pause(&self) -> Result<(), ClientError>;
    fn is_running(&self) -> bool;
}

/// Encrypts and decrypts data kept on the local device.
#[async_trait]
pub trait LocalCipher: Send + Sync {
    fn id(&self) -> i64;
    async fn encrypt(&self, plaintext: &str) -> Result<String, ClientError>;
    async fn decrypt(&self, ciphertext: &str) -> Result<String, ClientError>;
}
