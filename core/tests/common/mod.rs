#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use haven_core::api::{
    ClientError, ClientHandle, ClientParams, CoverTraffic, CoverTrafficConfig, EventBus,
    HealthCallback, LocalCipher, MemoryBackend, MemoryLegacyStorage, MemoryStore, NetworkApi,
    Password, SessionConfig, SessionController, SessionOptions, StoreManager, TrackNetworkPeriod,
    TrackingConfig,
};
use tokio::sync::Notify;

/// Route `tracing` output through the test harness; set `RUST_LOG` to see it.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    Ready,
    Fail,
    Hang,
}

pub struct FakeState {
    next_id: AtomicI64,
    pub create_calls: AtomicUsize,
    pub load_calls: AtomicUsize,
    pub cover_created: AtomicUsize,
    pub cipher_created: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_load: AtomicBool,
    pub fail_follow: AtomicBool,
    pub fail_cipher: AtomicBool,
    pub wait_mode: Mutex<WaitMode>,
    pub load_gates: Mutex<VecDeque<Arc<Notify>>>,
    pub last_params: Mutex<Option<ClientParams>>,
    pub clients: Mutex<Vec<Arc<FakeClient>>>,
    pub covers: Mutex<Vec<Arc<FakeCover>>>,
    pub cipher_client_ids: Mutex<Vec<i64>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            create_calls: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
            cover_created: AtomicUsize::new(0),
            cipher_created: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            fail_load: AtomicBool::new(false),
            fail_follow: AtomicBool::new(false),
            fail_cipher: AtomicBool::new(false),
            wait_mode: Mutex::new(WaitMode::Ready),
            load_gates: Mutex::new(VecDeque::new()),
            last_params: Mutex::new(None),
            clients: Mutex::new(Vec::new()),
            covers: Mutex::new(Vec::new()),
            cipher_client_ids: Mutex::new(Vec::new()),
        }
    }
}

impl FakeState {
    pub fn set_wait_mode(&self, mode: WaitMode) {
        *self.wait_mode.lock().unwrap() = mode;
    }

    /// The next `load_client` call blocks until the returned gate is
    /// notified.
    pub fn hold_next_load(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.load_gates.lock().unwrap().push_back(Arc::clone(&gate));
        gate
    }

    pub fn client(&self, index: usize) -> Arc<FakeClient> {
        Arc::clone(&self.clients.lock().unwrap()[index])
    }

    pub fn cover(&self, index: usize) -> Arc<FakeCover> {
        Arc::clone(&self.covers.lock().unwrap()[index])
    }
}

#[derive(Clone, Default)]
pub struct FakeNetwork {
    pub state: Arc<FakeState>,
}

#[async_trait]
impl NetworkApi for FakeNetwork {
    fn name(&self) -> &str {
        "fake"
    }

    async fn default_network_definition(&self) -> Result<String, ClientError> {
        Ok("{\"Gateways\":[]}".into())
    }

    fn default_params(&self) -> ClientParams {
        ClientParams::from_json("{\"Network\":{\"MaxCheckedRounds\":500}}").unwrap()
    }

    async fn create_client(
        &self,
        _ndf: &str,
        _storage_path: &str,
        _password: &Password,
        _registration_code: &str,
    ) -> Result<(), ClientError> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::Operation("create refused".into()));
        }
        Ok(())
    }

    async fn load_client(
        &self,
        _storage_path: &str,
        _password: &Password,
        params: &ClientParams,
    ) -> Result<Arc<dyn ClientHandle>, ClientError> {
        self.state.load_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_params.lock().unwrap() = Some(params.clone());
        let gate = self.state.load_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.state.fail_load.load(Ordering::SeqCst) {
            return Err(ClientError::Operation("load refused".into()));
        }
        let client = Arc::new(FakeClient {
            id: self.state.next_id.fetch_add(1, Ordering::SeqCst),
            state: Arc::clone(&self.state),
            following: AtomicBool::new(false),
            stop_calls: AtomicUsize::new(0),
            health: Mutex::new(Vec::new()),
            tracking: Mutex::new(Vec::new()),
        });
        self.state.clients.lock().unwrap().push(Arc::clone(&client));
        Ok(client)
    }

    async fn new_cover_traffic(
        &self,
        _client_id: i64,
        config: &CoverTrafficConfig,
    ) -> Result<Arc<dyn CoverTraffic>, ClientError> {
        self.state.cover_created.fetch_add(1, Ordering::SeqCst);
        let cover = Arc::new(FakeCover {
            config: config.clone(),
            running: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
        });
        self.state.covers.lock().unwrap().push(Arc::clone(&cover));
        Ok(cover)
    }

    async fn new_cipher(
        &self,
        client_id: i64,
        _password: &Password,
        _max_payload_block_size: usize,
    ) -> Result<Arc<dyn LocalCipher>, ClientError> {
        if self.state.fail_cipher.load(Ordering::SeqCst) {
            return Err(ClientError::Operation("cipher refused".into()));
        }
        self.state.cipher_created.fetch_add(1, Ordering::SeqCst);
        self.state.cipher_client_ids.lock().unwrap().push(client_id);
        Ok(Arc::new(FakeCipher { id: client_id }))
    }
}

pub struct FakeClient {
    pub id: i64,
    state: Arc<FakeState>,
    pub following: AtomicBool,
    pub stop_calls: AtomicUsize,
    health: Mutex<Vec<Arc<dyn Fn(bool) + Send + Sync>>>,
    pub tracking: Mutex<Vec<Duration>>,
}

impl FakeClient {
    pub fn fire_health(&self, healthy: bool) {
        let callbacks: Vec<_> = self.health.lock().unwrap().clone();
        for cb in callbacks {
            cb(healthy);
        }
    }

    pub fn health_callbacks(&self) -> usize {
        self.health.lock().unwrap().len()
    }

    pub fn tracking_periods(&self) -> Vec<Duration> {
        self.tracking.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientHandle for FakeClient {
    fn id(&self) -> i64 {
        self.id
    }

    fn start_following(&self, _follower_timeout: Duration) -> Result<(), ClientError> {
        if self.state.fail_follow.load(Ordering::SeqCst) {
            return Err(ClientError::Operation("follower refused".into()));
        }
        self.following.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_network(&self, _timeout: Duration) -> Result<(), ClientError> {
        let mode = *self.state.wait_mode.lock().unwrap();
        match mode {
            WaitMode::Ready => Ok(()),
            WaitMode::Fail => Err(ClientError::Operation("network unreachable".into())),
            WaitMode::Hang => std::future::pending().await,
        }
    }

    fn stop_following(&self) -> Result<(), ClientError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.following.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn add_health_callback(&self, callback: HealthCallback) {
        self.health.lock().unwrap().push(Arc::from(callback));
    }

    fn set_tracking_period(&self, period: Duration) {
        self.tracking.lock().unwrap().push(period);
    }

    async fn node_registration_status(&self) -> Result<(u32, u32), ClientError> {
        Ok((10, 10))
    }
}

pub struct FakeCover {
    pub config: CoverTrafficConfig,
    pub running: AtomicBool,
    pub starts: AtomicUsize,
}

impl CoverTraffic for FakeCover {
    fn start(&self) -> Result<(), ClientError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
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

pub struct FakeCipher {
    id: i64,
}

#[async_trait]
impl LocalCipher for FakeCipher {
    fn id(&self) -> i64 {
        self.id
    }

    async fn encrypt(&self, plaintext: &str) -> Result<String, ClientError> {
        Ok(format!("enc:{plaintext}"))
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, ClientError> {
        ciphertext
            .strip_prefix("enc:")
            .map(str::to_string)
            .ok_or_else(|| ClientError::Operation("not ciphertext".into()))
    }
}

pub struct Harness {
    pub data: Arc<MemoryStore>,
    pub store: StoreManager,
    pub legacy: Arc<MemoryLegacyStorage>,
    pub bus: EventBus,
    pub network: FakeNetwork,
    pub tracking: TrackNetworkPeriod,
    pub controller: SessionController,
}

impl Harness {
    pub async fn new(data: MemoryStore, legacy: MemoryLegacyStorage) -> Self {
        Self::with_session(data, legacy, SessionConfig::default()).await
    }

    pub async fn with_session(
        data: MemoryStore,
        legacy: MemoryLegacyStorage,
        session: SessionConfig,
    ) -> Self {
        init_test_logging();
        let data = Arc::new(data);
        let store = StoreManager::new(Arc::new(MemoryBackend::with_store(Arc::clone(&data))));
        let legacy = Arc::new(legacy);
        let bus = EventBus::new();
        let network = FakeNetwork::default();
        let tracking = TrackNetworkPeriod::open(store.clone(), TrackingConfig::default()).await;
        let controller = SessionController::new(
            Arc::new(network.clone()),
            store.clone(),
            legacy.clone(),
            bus.clone(),
            tracking.clone(),
            SessionOptions {
                state_path: "test-state".into(),
                registration_code: String::new(),
                session,
            },
        );
        Self {
            data,
            store,
            legacy,
            bus,
            network,
            tracking,
            controller,
        }
    }

    pub fn fake(&self) -> &FakeState {
        &self.network.state
    }
}

/// Yield until `cond` holds; panics after many rounds.
pub async fn eventually<F: FnMut() -> bool>(mut cond: F) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
