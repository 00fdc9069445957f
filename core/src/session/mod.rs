//! Session lifecycle: bring-up state machine, observation and readiness.

pub mod controller;
pub mod readiness;
pub mod transitions;
pub mod types;

pub use controller::{SessionController, SessionOptions};
pub use readiness::{wait_for_registration, RegistrationProgress};
pub use transitions::{StateTransition, TransitionError};
pub use types::{InitState, NetworkStatus, SessionEvent, SessionPhase, SessionSnapshot};
