use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use haven_core::api::{
    AppConfig, LegacyStorage, MemoryBackend, MemoryLegacyStorage, NetworkApi, NetworkConfig,
    StoreBackend,
};

use crate::legacy::JsonFileLegacyStorage;
use crate::network::LoopbackNetwork;
use crate::store::JsonFileBackend;

fn data_file(cfg: &AppConfig, name: &str) -> Option<PathBuf> {
    if cfg.storage.data_dir.is_empty() {
        return None;
    }
    Some(Path::new(&cfg.storage.data_dir).join(name))
}

/// JSON-file store under the data directory; in-memory when no data
/// directory is configured.
pub fn build_store_backend(cfg: &AppConfig) -> Arc<dyn StoreBackend> {
    match data_file(cfg, &cfg.storage.kv_file) {
        Some(path) => Arc::new(JsonFileBackend::new(path)),
        None => Arc::new(MemoryBackend::new()),
    }
}

pub fn build_legacy_storage(cfg: &AppConfig) -> Result<Arc<dyn LegacyStorage>> {
    match data_file(cfg, &cfg.storage.legacy_file) {
        Some(path) => Ok(Arc::new(JsonFileLegacyStorage::open(path)?)),
        None => Ok(Arc::new(MemoryLegacyStorage::new())),
    }
}

pub fn build_network(cfg: &AppConfig) -> Arc<dyn NetworkApi> {
    match &cfg.network {
        NetworkConfig::Loopback(lb_cfg) => Arc::new(LoopbackNetwork::new(lb_cfg.clone())),
    }
}
