#[allow(clippy::module_inception)]
pub mod error;
pub mod session;

pub use error::{CliError, MigrationError, SettingError, StoreError};
pub use session::{ClientError, SessionError};
