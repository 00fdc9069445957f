pub mod factory;
pub mod legacy;
pub mod network;
pub mod services;
pub mod store;
