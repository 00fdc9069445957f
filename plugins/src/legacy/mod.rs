pub mod file;

pub use file::JsonFileLegacyStorage;
