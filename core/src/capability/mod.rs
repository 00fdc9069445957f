//! Seams to the opaque network library: client creation and loading,
//! cover traffic and local-data ciphers.

pub mod params;
pub mod password;
pub mod traits;

pub use params::ClientParams;
pub use password::Password;
pub use traits::{ClientHandle, CoverTraffic, HealthCallback, LocalCipher, NetworkApi};
