pub mod file;

pub use file::{JsonFileBackend, JsonFileStore};
