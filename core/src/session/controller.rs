//! Drives one client from a decrypted password to a connected session.
//!
//! Every password event starts a new attempt tagged with a generation
//! number. Stages of an older attempt may still finish after a newer one
//! started; their results are discarded and nothing they produced is kept.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::readiness::{wait_for_registration, RegistrationProgress};
use super::transitions::{StateTransition, TransitionError};
use super::types::{InitState, NetworkStatus, SessionEvent, SessionPhase, SessionSnapshot};
use crate::capability::{ClientHandle, CoverTraffic, LocalCipher, NetworkApi, Password};
use crate::config::{AppConfig, RegistrationConfig, SessionConfig};
use crate::error::{ClientError, SessionError};
use crate::events::{AppEvent, EventBus, ListenerGuard, Topic};
use crate::settings::{keys, AccountSync, TrackNetworkPeriod};
use crate::store::{LegacyStorage, StoreManager};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory the client keeps its state in
    pub state_path: String,
    pub registration_code: String,
    pub session: SessionConfig,
}

impl SessionOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let state_path = Path::new(&cfg.storage.state_path);
        let state_path = if state_path.is_relative() && !cfg.storage.data_dir.is_empty() {
            Path::new(&cfg.storage.data_dir).join(state_path)
        } else {
            state_path.to_path_buf()
        };
        Self {
            state_path: state_path.to_string_lossy().into_owned(),
            registration_code: String::new(),
            session: cfg.session.clone(),
        }
    }
}

#[derive(Default)]
struct Handles {
    client: Option<Arc<dyn ClientHandle>>,
    cover: Option<Arc<dyn CoverTraffic>>,
    cipher: Option<Arc<dyn LocalCipher>>,
    tracking_task: Option<JoinHandle<()>>,
}

impl Handles {
    /// Pause cover traffic, stop following and drop everything.
    fn release(self) {
        if let Some(task) = self.tracking_task {
            task.abort();
        }
        if let Some(cover) = &self.cover {
            if cover.is_running() {
                if let Err(e) = cover.pause() {
                    tracing::warn!("failed to pause cover traffic: {}", e);
                }
            }
        }
        if let Some(client) = &self.client {
            if let Err(e) = client.stop_following() {
                tracing::debug!(client_id = client.id(), "stop following: {}", e);
            }
        }
    }
}

struct SessionState {
    phase: SessionPhase,
    init_state: InitState,
    network_status: NetworkStatus,
    generation: u64,
    handles: Handles,
    last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            init_state: InitState::Uninitialized,
            network_status: NetworkStatus::Uninitialized,
            generation: 0,
            handles: Handles::default(),
            last_error: None,
        }
    }
}

struct ControllerInner {
    network: Arc<dyn NetworkApi>,
    store: StoreManager,
    legacy: Arc<dyn LegacyStorage>,
    bus: EventBus,
    tracking: TrackNetworkPeriod,
    options: SessionOptions,
    state: Mutex<SessionState>,
    /// Read once, then kept in memory
    signup_flag: tokio::sync::Mutex<Option<bool>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    event_tx: broadcast::Sender<SessionEvent>,
}

#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

impl SessionController {
    pub fn new(
        network: Arc<dyn NetworkApi>,
        store: StoreManager,
        legacy: Arc<dyn LegacyStorage>,
        bus: EventBus,
        tracking: TrackNetworkPeriod,
        options: SessionOptions,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(ControllerInner {
                network,
                store,
                legacy,
                bus,
                tracking,
                options,
                state: Mutex::new(SessionState::default()),
                signup_flag: tokio::sync::Mutex::new(None),
                snapshot_tx,
                event_tx,
            }),
        }
    }

    /// Read the signup flag and account-sync settings, then start reacting
    /// to password events. The controller listens for as long as the
    /// returned guard lives.
    pub async fn start(&self) -> ListenerGuard {
        let previously = self.previously_initialized().await;
        let sync = self.account_sync().await;
        tracing::info!(
            previously_initialized = previously,
            account_sync = sync.status().as_str(),
            account_sync_service = sync.service().as_str(),
            "session controller started"
        );

        let weak = Arc::downgrade(&self.inner);
        self.inner.bus.listen(Topic::PasswordDecrypted, move |event| {
            let AppEvent::PasswordDecrypted(password) = event else {
                return;
            };
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let controller = SessionController { inner };
            let runtime = match tokio::runtime::Handle::try_current() {
                Ok(rt) => rt,
                Err(_) => {
                    tracing::error!("password decrypted outside a tokio runtime, ignoring");
                    return;
                }
            };
            let generation = match controller.begin_attempt() {
                Ok(generation) => generation,
                Err(e) => {
                    tracing::warn!("cannot start session attempt: {}", e);
                    return;
                }
            };
            let password = password.clone();
            runtime.spawn(async move {
                let _ = controller.run_attempt(generation, password).await;
            });
        })
    }

    /// Run a full attempt inline and return the resulting snapshot.
    /// Bring-up failures are recorded in the snapshot, not returned.
    pub async fn bring_up(&self, password: Password) -> Result<SessionSnapshot, SessionError> {
        let generation = self.begin_attempt()?;
        let _ = self.run_attempt(generation, password).await;
        Ok(self.snapshot())
    }

    /// Supersede any in-flight attempt, release its handles and return the
    /// new generation.
    pub fn begin_attempt(&self) -> Result<u64, SessionError> {
        let (generation, from, handles) = {
            let mut state = self.lock_state();
            if !StateTransition::can_restart(state.phase) {
                return Err(TransitionError::InvalidTransition {
                    from: state.phase,
                    to: SessionPhase::Idle,
                }
                .into());
            }
            state.generation += 1;
            let from = state.phase;
            state.phase = SessionPhase::Idle;
            state.init_state = InitState::Uninitialized;
            state.network_status = NetworkStatus::Uninitialized;
            state.last_error = None;
            (state.generation, from, std::mem::take(&mut state.handles))
        };

        handles.release();
        tracing::info!(generation, "session attempt started");
        if from != SessionPhase::Idle {
            self.emit_phase_change(generation, from, SessionPhase::Idle);
        }
        self.publish();
        Ok(generation)
    }

    /// Drive attempt `generation` to Connected. Failures other than
    /// supersession leave the controller in `Failed`.
    pub async fn run_attempt(
        &self,
        generation: u64,
        password: Password,
    ) -> Result<(), SessionError> {
        match self.drive(generation, &password).await {
            Ok(()) => Ok(()),
            Err(SessionError::Superseded(g)) => {
                tracing::debug!(generation = g, "stale session attempt discarded");
                Err(SessionError::Superseded(g))
            }
            Err(e) => {
                self.fail(generation, &e);
                Err(e)
            }
        }
    }

    async fn drive(&self, generation: u64, password: &Password) -> Result<(), SessionError> {
        let network = Arc::clone(&self.inner.network);
        let options = &self.inner.options;

        if self.previously_initialized().await {
            self.transition(generation, SessionPhase::Loading, |s| {
                s.init_state = InitState::Loading
            })?;
        } else {
            self.transition(generation, SessionPhase::Resetting, |_| {})?;
            self.reset_local_state().await?;
            self.transition(generation, SessionPhase::Creating, |s| {
                s.init_state = InitState::Creating
            })?;

            let ndf = network
                .default_network_definition()
                .await
                .map_err(SessionError::ClientCreate)?;
            network
                .create_client(&ndf, &options.state_path, password, &options.registration_code)
                .await
                .map_err(SessionError::ClientCreate)?;
            self.update(generation, |s| s.init_state = InitState::Created)?;
            self.mark_initialized().await;

            self.transition(generation, SessionPhase::Loading, |s| {
                s.init_state = InitState::Loading
            })?;
        }

        let params = network.default_params().with_immediate_sending();
        let client = network
            .load_client(&options.state_path, password, &params)
            .await
            .map_err(SessionError::ClientLoad)?;
        let client_id = client.id();
        self.transition(generation, SessionPhase::Connecting, |s| {
            s.init_state = InitState::Loaded;
            s.network_status = NetworkStatus::Connecting;
            s.handles.client = Some(Arc::clone(&client));
        })?;
        tracing::info!(generation, client_id, "client loaded");
        self.emit(SessionEvent::ClientLoaded {
            generation,
            client_id,
            timestamp: Utc::now(),
        });
        self.inner.bus.emit(AppEvent::ClientLoaded(Arc::clone(&client)));

        if let Err(e) = client.start_following(options.session.follower_timeout()) {
            tracing::warn!(generation, "failed to start network follower: {}", e);
            let message = e.to_string();
            self.update(generation, |s| {
                s.network_status = NetworkStatus::Failed;
                s.last_error = Some(message);
            })?;
        }

        let wait = options.session.network_wait_timeout();
        match tokio::time::timeout(wait, client.wait_for_network(wait)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SessionError::NetworkTimeout(e)),
            Err(_) => {
                return Err(SessionError::NetworkTimeout(ClientError::Timeout(
                    options.session.network_wait_timeout_ms,
                )))
            }
        }

        self.enter_connected(generation, &client, password).await
    }

    async fn enter_connected(
        &self,
        generation: u64,
        client: &Arc<dyn ClientHandle>,
        password: &Password,
    ) -> Result<(), SessionError> {
        self.transition(generation, SessionPhase::Connected, |s| {
            s.network_status = NetworkStatus::Connected;
            s.last_error = None;
        })?;

        let weak = Arc::downgrade(&self.inner);
        client.add_health_callback(Box::new(move |healthy| {
            if let Some(inner) = weak.upgrade() {
                SessionController { inner }.on_health(generation, healthy);
            }
        }));

        client.set_tracking_period(self.inner.tracking.period());
        self.watch_tracking(generation, Arc::clone(client))?;

        let session_cfg = &self.inner.options.session;
        match self
            .inner
            .network
            .new_cipher(client.id(), password, session_cfg.max_payload_block_size)
            .await
        {
            Ok(cipher) => self.update(generation, |s| s.handles.cipher = Some(cipher))?,
            Err(e) => tracing::warn!("{}", SessionError::CipherDerivation(e)),
        }

        match self
            .inner
            .network
            .new_cover_traffic(client.id(), &session_cfg.cover_traffic)
            .await
        {
            Ok(cover) => {
                self.update(generation, |s| s.handles.cover = Some(cover))?;
                self.start_cover_traffic(generation);
            }
            Err(e) => tracing::warn!("{}", SessionError::CoverTraffic(e)),
        }

        tracing::info!(generation, client_id = client.id(), "session connected");
        self.emit(SessionEvent::Ready {
            generation,
            client_id: client.id(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Tear down the current session: pause cover traffic, stop following,
    /// drop every handle and return to Idle. Returns `false` when there was
    /// nothing to tear down.
    pub fn disconnect(&self) -> bool {
        let (generation, from, handles) = {
            let mut state = self.lock_state();
            if StateTransition::validate(state.phase, SessionPhase::Disconnecting).is_err() {
                return false;
            }
            state.generation += 1;
            let from = state.phase;
            state.phase = SessionPhase::Disconnecting;
            (state.generation, from, std::mem::take(&mut state.handles))
        };
        self.emit_phase_change(generation, from, SessionPhase::Disconnecting);
        self.publish();

        handles.release();

        let finished = {
            let mut state = self.lock_state();
            let current = state.generation == generation;
            if current {
                state.phase = SessionPhase::Idle;
                state.init_state = InitState::Uninitialized;
                state.network_status = NetworkStatus::Disconnected;
                state.last_error = None;
            }
            current
        };
        if finished {
            self.emit_phase_change(generation, SessionPhase::Disconnecting, SessionPhase::Idle);
            self.emit(SessionEvent::Disconnected {
                generation,
                timestamp: Utc::now(),
            });
        }
        self.publish();
        tracing::info!(generation, "session disconnected");
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Wait until a snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let snapshot = match rx.wait_for(|s| predicate(s)).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock_state().phase
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.lock_state().network_status
    }

    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    pub fn client(&self) -> Option<Arc<dyn ClientHandle>> {
        self.lock_state().handles.client.clone()
    }

    /// Absent until the session connected and derivation succeeded.
    pub fn cipher(&self) -> Option<Arc<dyn LocalCipher>> {
        self.lock_state().handles.cipher.clone()
    }

    pub fn cover_traffic(&self) -> Option<Arc<dyn CoverTraffic>> {
        self.lock_state().handles.cover.clone()
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Poll node registration of the current client until the configured
    /// threshold is reached.
    pub async fn check_registration_readiness<F>(
        &self,
        cfg: &RegistrationConfig,
        on_progress: F,
    ) -> Result<RegistrationProgress, SessionError>
    where
        F: FnMut(&RegistrationProgress),
    {
        let client = self.client().ok_or(SessionError::NotReady)?;
        wait_for_registration(client.as_ref(), cfg, on_progress).await
    }

    pub async fn account_sync(&self) -> AccountSync {
        AccountSync::open(self.inner.store.clone()).await
    }

    pub async fn previously_initialized(&self) -> bool {
        let mut flag = self.inner.signup_flag.lock().await;
        if let Some(value) = *flag {
            return value;
        }
        let value = self.read_signup_flag().await;
        *flag = Some(value);
        value
    }

    async fn read_signup_flag(&self) -> bool {
        match self.inner.store.get_value(keys::CLIENT_INITIALIZED).await {
            Ok(Some(value)) => return value == "true",
            Ok(None) => {}
            Err(e) => tracing::warn!("signup flag unreadable from store: {}", e),
        }
        match self.inner.legacy.get_item(keys::CLIENT_INITIALIZED) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                tracing::warn!("signup flag unreadable from legacy storage: {}", e);
                false
            }
        }
    }

    async fn mark_initialized(&self) {
        if let Err(e) = self
            .inner
            .store
            .set_value(keys::CLIENT_INITIALIZED, "true")
            .await
        {
            tracing::warn!("failed to persist signup flag: {}", e);
        }
        *self.inner.signup_flag.lock().await = Some(true);
    }

    async fn reset_local_state(&self) -> Result<(), SessionError> {
        tracing::info!("clearing local state before creating a new client");
        self.inner
            .store
            .clear()
            .await
            .map_err(|e| SessionError::Reset(e.to_string()))?;
        self.inner
            .legacy
            .clear()
            .map_err(|e| SessionError::Reset(e.to_string()))
    }

    fn on_health(&self, generation: u64, healthy: bool) {
        let target = if healthy {
            SessionPhase::Connected
        } else {
            SessionPhase::Disconnected
        };
        let (from, client) = {
            let mut state = self.lock_state();
            if state.generation != generation
                || !matches!(
                    state.phase,
                    SessionPhase::Connected | SessionPhase::Disconnected
                )
                || state.phase == target
            {
                return;
            }
            let from = state.phase;
            state.phase = target;
            state.network_status = if healthy {
                NetworkStatus::Connected
            } else {
                NetworkStatus::Disconnected
            };
            (from, state.handles.client.clone())
        };

        tracing::info!(generation, healthy, "network health changed");
        self.emit_phase_change(generation, from, target);
        self.emit(SessionEvent::HealthChanged {
            generation,
            healthy,
            timestamp: Utc::now(),
        });

        if healthy {
            if let Some(client) = client {
                client.set_tracking_period(self.inner.tracking.period());
            }
            self.start_cover_traffic(generation);
        }
        self.publish();
    }

    /// Start cover traffic if it exists, is idle, and the network is
    /// Connected.
    fn start_cover_traffic(&self, generation: u64) {
        let cover = {
            let state = self.lock_state();
            if state.generation != generation || state.network_status != NetworkStatus::Connected {
                return;
            }
            state.handles.cover.clone()
        };
        if let Some(cover) = cover {
            if !cover.is_running() {
                match cover.start() {
                    Ok(()) => tracing::debug!(generation, "cover traffic started"),
                    Err(e) => tracing::warn!("{}", SessionError::CoverTraffic(e)),
                }
            }
        }
        self.publish();
    }

    /// Re-apply the tracking period whenever the setting changes while the
    /// network is Connected.
    fn watch_tracking(
        &self,
        generation: u64,
        client: Arc<dyn ClientHandle>,
    ) -> Result<(), SessionError> {
        let mut rx = self.inner.tracking.replica().subscribe();
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let Some(inner) = weak.upgrade() else { break };
                let controller = SessionController { inner };
                let connected = {
                    let state = controller.lock_state();
                    if state.generation != generation {
                        break;
                    }
                    state.network_status == NetworkStatus::Connected
                };
                if connected {
                    let period = controller.inner.tracking.period();
                    tracing::debug!(generation, ?period, "tracking period updated");
                    client.set_tracking_period(period);
                }
            }
        });

        let mut task = Some(task);
        let result = self.update(generation, |s| s.handles.tracking_task = task.take());
        if let Some(task) = task {
            task.abort();
        }
        result
    }

    fn fail(&self, generation: u64, error: &SessionError) {
        let (from, handles) = {
            let mut state = self.lock_state();
            if state.generation != generation {
                return;
            }
            let from = state.phase;
            if let Err(e) = StateTransition::validate(from, SessionPhase::Failed) {
                tracing::debug!("forcing failed phase: {}", e);
            }
            state.phase = SessionPhase::Failed;
            state.network_status = NetworkStatus::Failed;
            state.last_error = Some(error.to_string());
            (from, std::mem::take(&mut state.handles))
        };
        handles.release();

        tracing::error!(generation, phase = %from, "session bring-up failed: {}", error);
        self.emit_phase_change(generation, from, SessionPhase::Failed);
        self.emit(SessionEvent::Failed {
            generation,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
        self.publish();
    }

    fn transition<F>(&self, generation: u64, to: SessionPhase, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut SessionState),
    {
        let from = {
            let mut state = self.lock_state();
            if state.generation != generation {
                return Err(SessionError::Superseded(generation));
            }
            let from = state.phase;
            StateTransition::validate(from, to)?;
            state.phase = to;
            f(&mut state);
            from
        };
        tracing::info!(
            generation,
            "session phase {} -> {} ({})",
            from,
            to,
            StateTransition::phase_description(to)
        );
        self.emit_phase_change(generation, from, to);
        self.publish();
        Ok(())
    }

    /// Mutate state of attempt `generation` without changing phase.
    fn update<F>(&self, generation: u64, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut SessionState),
    {
        {
            let mut state = self.lock_state();
            if state.generation != generation {
                return Err(SessionError::Superseded(generation));
            }
            f(&mut state);
        }
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        let (mut snapshot, cover) = {
            let state = self.lock_state();
            (
                SessionSnapshot {
                    phase: state.phase,
                    init_state: state.init_state,
                    network_status: state.network_status,
                    generation: state.generation,
                    client_id: state.handles.client.as_ref().map(|c| c.id()),
                    has_cover_traffic: state.handles.cover.is_some(),
                    cover_traffic_running: false,
                    has_cipher: state.handles.cipher.is_some(),
                    last_error: state.last_error.clone(),
                    updated_at: Utc::now(),
                },
                state.handles.cover.clone(),
            )
        };
        snapshot.cover_traffic_running = cover.is_some_and(|c| c.is_running());
        self.inner.snapshot_tx.send_replace(snapshot);
    }

    fn emit_phase_change(&self, generation: u64, old_phase: SessionPhase, new_phase: SessionPhase) {
        self.emit(SessionEvent::PhaseChanged {
            generation,
            old_phase,
            new_phase,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
