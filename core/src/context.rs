use crate::capability::NetworkApi;
use crate::config::AppConfig;
use crate::error::StoreError;
use crate::events::{AppEvent, EventBus};
use crate::migrate::{run_startup_migration, MigrationReport, StorageMigrator};
use crate::session::{SessionController, SessionOptions};
use crate::settings::TrackNetworkPeriod;
use crate::store::{LegacyStorage, StoreBackend, StoreManager};
use std::sync::Arc;

#[derive(Clone)]
pub struct Services {
    pub store_backend: Arc<dyn StoreBackend>,
    pub legacy: Arc<dyn LegacyStorage>,
    pub network: Arc<dyn NetworkApi>,
}

#[async_trait::async_trait]
pub trait ServicesFactory: Send + Sync {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, StoreError>;
}

/// Process-wide wiring: one store manager, one legacy storage and one event
/// bus shared by every component.
#[derive(Clone)]
pub struct AppContext {
    cfg: AppConfig,
    store: StoreManager,
    legacy: Arc<dyn LegacyStorage>,
    network: Arc<dyn NetworkApi>,
    bus: EventBus,
}

impl AppContext {
    pub async fn new(cfg: AppConfig, factory: &dyn ServicesFactory) -> Result<Self, StoreError> {
        let services = factory.build_services(&cfg).await?;
        Ok(Self::from_services(cfg, services))
    }

    pub fn from_services(cfg: AppConfig, services: Services) -> Self {
        Self {
            cfg,
            store: StoreManager::new(services.store_backend),
            legacy: services.legacy,
            network: services.network,
            bus: EventBus::new(),
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn store(&self) -> &StoreManager {
        &self.store
    }

    pub fn legacy(&self) -> Arc<dyn LegacyStorage> {
        Arc::clone(&self.legacy)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Open the store, announce it on the bus and run the one-shot migration.
    /// Neither failure stops startup; the store is retried on next access.
    pub async fn startup(&self) -> Option<MigrationReport> {
        match self.store.store().await {
            Ok(_) => {
                self.bus.emit(AppEvent::StorageReady {
                    backend: self.store.backend_name().to_string(),
                });
            }
            Err(e) => tracing::warn!("persistent store unavailable at startup: {}", e),
        }
        let migrator = StorageMigrator::new(self.store.clone(), self.legacy());
        run_startup_migration(&migrator).await
    }

    pub async fn tracking(&self) -> TrackNetworkPeriod {
        TrackNetworkPeriod::open(self.store.clone(), self.cfg.tracking.clone()).await
    }

    pub async fn session_controller(&self) -> SessionController {
        SessionController::new(
            Arc::clone(&self.network),
            self.store.clone(),
            self.legacy(),
            self.bus.clone(),
            self.tracking().await,
            SessionOptions::from_config(&self.cfg),
        )
    }
}
