mod load;
mod types;

pub use load::{apply_env_overrides, get_haven_data_dir, load_default};
pub use types::{
    AppConfig, CoverTrafficConfig, LoggingConfig, LoopbackNetworkConfig, NetworkConfig,
    RegistrationConfig, SessionConfig, StorageConfig, TrackingConfig,
};
