//! In-process stand-in for the network library.
//!
//! Client state is a small JSON file under the state path so that a client
//! created by one process can be loaded by the next. The network becomes
//! ready `ready_after_ms` after following starts; node registration
//! advances by `nodes_per_poll` on every status query.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;

use haven_core::api::{
    ClientError, ClientHandle, ClientParams, CoverTraffic, CoverTrafficConfig, HealthCallback,
    LocalCipher, LoopbackNetworkConfig, NetworkApi, Password,
};

const CLIENT_FILE: &str = "loopback-client.json";
const KEY_SALT: &[u8] = b"haven-loopback";

#[derive(Debug, Serialize, Deserialize)]
struct ClientRecord {
    client_id: i64,
    password_check: String,
    ndf_gateways: usize,
}

#[derive(Default)]
struct Faults {
    create: AtomicBool,
    load: AtomicBool,
    unreachable: AtomicBool,
    cipher: AtomicBool,
}

#[derive(Clone)]
pub struct LoopbackNetwork {
    cfg: LoopbackNetworkConfig,
    faults: Arc<Faults>,
    clients: Arc<Mutex<Vec<Arc<LoopbackClient>>>>,
}

impl LoopbackNetwork {
    pub fn new(cfg: LoopbackNetworkConfig) -> Self {
        Self {
            cfg,
            faults: Arc::new(Faults::default()),
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.faults.create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.faults.load.store(fail, Ordering::SeqCst);
    }

    /// `wait_for_network` never succeeds while set.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_fail_cipher(&self, fail: bool) {
        self.faults.cipher.store(fail, Ordering::SeqCst);
    }

    /// Clients loaded so far, oldest first.
    pub fn clients(&self) -> Vec<Arc<LoopbackClient>> {
        lock(&self.clients).clone()
    }

    fn record_path(storage_path: &str) -> PathBuf {
        Path::new(storage_path).join(CLIENT_FILE)
    }
}

#[async_trait]
impl NetworkApi for LoopbackNetwork {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn default_network_definition(&self) -> Result<String, ClientError> {
        let gateways: Vec<_> = (0..self.cfg.total_nodes)
            .map(|i| json!({ "Id": format!("gw-{i}"), "Address": format!("loopback:{i}") }))
            .collect();
        Ok(json!({ "Registration": { "Address": "loopback" }, "Gateways": gateways }).to_string())
    }

    fn default_params(&self) -> ClientParams {
        ClientParams::from_value(json!({
            "Network": { "EnableImmediateSending": false, "MaxCheckedRounds": 500 },
            "CMix": { "RoundTries": 10 }
        }))
        .unwrap_or_default()
    }

    async fn create_client(
        &self,
        ndf: &str,
        storage_path: &str,
        password: &Password,
        _registration_code: &str,
    ) -> Result<(), ClientError> {
        if self.faults.create.load(Ordering::SeqCst) {
            return Err(ClientError::Operation("loopback create refused".into()));
        }
        if password.is_empty() {
            return Err(ClientError::InvalidParams("empty password".into()));
        }
        let ndf: serde_json::Value =
            serde_json::from_str(ndf).map_err(|e| ClientError::InvalidParams(e.to_string()))?;
        let record = ClientRecord {
            client_id: i64::from(std::process::id()),
            password_check: STANDARD.encode(xor(KEY_SALT, password.as_bytes())),
            ndf_gateways: ndf["Gateways"].as_array().map_or(0, Vec::len),
        };

        tokio::fs::create_dir_all(storage_path)
            .await
            .map_err(|e| ClientError::Operation(format!("{storage_path}: {e}")))?;
        let bytes =
            serde_json::to_vec_pretty(&record).map_err(|e| ClientError::Operation(e.to_string()))?;
        tokio::fs::write(Self::record_path(storage_path), bytes)
            .await
            .map_err(|e| ClientError::Operation(e.to_string()))?;
        tracing::debug!(storage_path, client_id = record.client_id, "loopback client created");
        Ok(())
    }

    async fn load_client(
        &self,
        storage_path: &str,
        password: &Password,
        params: &ClientParams,
    ) -> Result<Arc<dyn ClientHandle>, ClientError> {
        if self.faults.load.load(Ordering::SeqCst) {
            return Err(ClientError::Operation("loopback load refused".into()));
        }
        let bytes = tokio::fs::read(Self::record_path(storage_path))
            .await
            .map_err(|e| ClientError::Operation(format!("no client at {storage_path}: {e}")))?;
        let record: ClientRecord =
            serde_json::from_slice(&bytes).map_err(|e| ClientError::Operation(e.to_string()))?;
        if record.password_check != STANDARD.encode(xor(KEY_SALT, password.as_bytes())) {
            return Err(ClientError::Operation("wrong password".into()));
        }

        let client = Arc::new(LoopbackClient {
            id: record.client_id,
            ready_after: Duration::from_millis(self.cfg.ready_after_ms),
            total_nodes: self.cfg.total_nodes,
            nodes_per_poll: self.cfg.nodes_per_poll,
            immediate_sending: params.immediate_sending(),
            faults: Arc::clone(&self.faults),
            following_since: Mutex::new(None),
            registered: AtomicU32::new(0),
            health: Mutex::new(Vec::new()),
            tracking_period: Mutex::new(None),
        });
        lock(&self.clients).push(Arc::clone(&client));
        tracing::debug!(client_id = client.id, "loopback client loaded");
        Ok(client)
    }

    async fn new_cover_traffic(
        &self,
        _client_id: i64,
        config: &CoverTrafficConfig,
    ) -> Result<Arc<dyn CoverTraffic>, ClientError> {
        if config.max_messages_per_cycle == 0 {
            return Err(ClientError::InvalidParams(
                "cover traffic needs at least one message per cycle".into(),
            ));
        }
        Ok(Arc::new(LoopbackCoverTraffic {
            config: config.clone(),
            running: AtomicBool::new(false),
        }))
    }

    async fn new_cipher(
        &self,
        client_id: i64,
        password: &Password,
        max_payload_block_size: usize,
    ) -> Result<Arc<dyn LocalCipher>, ClientError> {
        if self.faults.cipher.load(Ordering::SeqCst) {
            return Err(ClientError::Operation("loopback cipher refused".into()));
        }
        if password.is_empty() {
            return Err(ClientError::InvalidParams("empty password".into()));
        }
        Ok(Arc::new(LoopbackCipher {
            id: client_id,
            key: xor(KEY_SALT, password.as_bytes()),
            max_payload: max_payload_block_size,
        }))
    }
}

pub struct LoopbackClient {
    id: i64,
    ready_after: Duration,
    total_nodes: u32,
    nodes_per_poll: u32,
    immediate_sending: bool,
    faults: Arc<Faults>,
    following_since: Mutex<Option<Instant>>,
    registered: AtomicU32,
    health: Mutex<Vec<Arc<dyn Fn(bool) + Send + Sync>>>,
    tracking_period: Mutex<Option<Duration>>,
}

impl LoopbackClient {
    pub fn is_following(&self) -> bool {
        lock(&self.following_since).is_some()
    }

    pub fn immediate_sending(&self) -> bool {
        self.immediate_sending
    }

    pub fn tracking_period(&self) -> Option<Duration> {
        *lock(&self.tracking_period)
    }

    /// Deliver a health signal to every registered callback.
    pub fn simulate_health(&self, healthy: bool) {
        let callbacks = lock(&self.health).clone();
        for callback in callbacks {
            callback(healthy);
        }
    }
}

#[async_trait]
impl ClientHandle for LoopbackClient {
    fn id(&self) -> i64 {
        self.id
    }

    fn start_following(&self, _follower_timeout: Duration) -> Result<(), ClientError> {
        let mut since = lock(&self.following_since);
        if since.is_some() {
            return Err(ClientError::Operation("already following".into()));
        }
        *since = Some(Instant::now());
        Ok(())
    }

    async fn wait_for_network(&self, timeout: Duration) -> Result<(), ClientError> {
        let timed_out = || ClientError::Timeout(timeout.as_millis() as u64);
        if self.faults.unreachable.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout).await;
            return Err(timed_out());
        }
        let Some(since) = *lock(&self.following_since) else {
            return Err(ClientError::Operation("network follower not running".into()));
        };
        let ready_at = since + self.ready_after;
        if ready_at > Instant::now() + timeout {
            tokio::time::sleep(timeout).await;
            return Err(timed_out());
        }
        tokio::time::sleep_until(ready_at).await;
        Ok(())
    }

    fn stop_following(&self) -> Result<(), ClientError> {
        match lock(&self.following_since).take() {
            Some(_) => Ok(()),
            None => Err(ClientError::Operation("network follower not running".into())),
        }
    }

    fn add_health_callback(&self, callback: HealthCallback) {
        lock(&self.health).push(Arc::from(callback));
    }

    fn set_tracking_period(&self, period: Duration) {
        *lock(&self.tracking_period) = Some(period);
    }

    async fn node_registration_status(&self) -> Result<(u32, u32), ClientError> {
        if !self.is_following() {
            return Err(ClientError::Operation("network follower not running".into()));
        }
        let total = self.total_nodes;
        let step = self.nodes_per_poll;
        let previous = self
            .registered
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_add(step).min(total))
            })
            .unwrap_or(total);
        Ok((previous.saturating_add(step).min(total), total))
    }
}

pub struct LoopbackCoverTraffic {
    config: CoverTrafficConfig,
    running: AtomicBool,
}

impl LoopbackCoverTraffic {
    pub fn config(&self) -> &CoverTrafficConfig {
        &self.config
    }
}

impl CoverTraffic for LoopbackCoverTraffic {
    fn start(&self) -> Result<(), ClientError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) -> Result<(), ClientError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// XOR stream keyed on the password; enough to exercise the contract.
pub struct LoopbackCipher {
    id: i64,
    key: Vec<u8>,
    max_payload: usize,
}

#[async_trait]
impl LocalCipher for LoopbackCipher {
    fn id(&self) -> i64 {
        self.id
    }

    async fn encrypt(&self, plaintext: &str) -> Result<String, ClientError> {
        if plaintext.len() > self.max_payload {
            return Err(ClientError::InvalidParams(format!(
                "payload of {} bytes exceeds {}",
                plaintext.len(),
                self.max_payload
            )));
        }
        Ok(STANDARD.encode(xor(&self.key, plaintext.as_bytes())))
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, ClientError> {
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|e| ClientError::InvalidParams(e.to_string()))?;
        String::from_utf8(xor(&self.key, &bytes))
            .map_err(|e| ClientError::Operation(format!("decrypted data is not utf-8: {e}")))
    }
}

fn xor(key: &[u8], data: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(d, k)| d ^ k)
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
