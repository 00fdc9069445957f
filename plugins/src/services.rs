//! ServicesFactory implementation: builds the store backend, legacy storage
//! and network capability from configuration for the CLI.
use async_trait::async_trait;
use haven_core::api::{AppConfig, Services, ServicesFactory, StoreError};

use crate::factory;

#[derive(Default)]
pub struct PluginServicesFactory;

#[async_trait]
impl ServicesFactory for PluginServicesFactory {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, StoreError> {
        let legacy = factory::build_legacy_storage(cfg)
            .map_err(|e| StoreError::Legacy(format!("{e:#}")))?;
        Ok(Services {
            store_backend: factory::build_store_backend(cfg),
            legacy,
            network: factory::build_network(cfg),
        })
    }
}
