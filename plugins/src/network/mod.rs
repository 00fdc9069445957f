pub mod loopback;

pub use loopback::{LoopbackCipher, LoopbackClient, LoopbackCoverTraffic, LoopbackNetwork};
