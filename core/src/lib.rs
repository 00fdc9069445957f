pub mod api;
pub mod capability;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod migrate;
pub mod session;
pub mod settings;
pub mod store;
