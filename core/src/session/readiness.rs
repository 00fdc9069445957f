//! Node-registration progress polling.
//!
//! Runs beside the controller as an observer of its client handle; it never
//! changes session state.

use std::time::Duration;

use tokio::time::Instant;

use crate::capability::ClientHandle;
use crate::config::RegistrationConfig;
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationProgress {
    pub registered: u32,
    pub total: u32,
}

impl RegistrationProgress {
    /// Fraction of nodes registered, in `[0, 1]`. Zero when no nodes are
    /// known yet.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (f64::from(self.registered) / f64::from(self.total)).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u32 {
        (self.ratio() * 100.0).ceil() as u32
    }

    pub fn message(&self) -> String {
        format!("{}/{} nodes registered", self.registered, self.total)
    }

    pub fn is_ready(&self, threshold: f64) -> bool {
        self.total > 0 && self.ratio() >= threshold
    }
}

/// Poll `client` until the registered ratio reaches
/// `cfg.readiness_threshold`, reporting every poll to `on_progress`.
pub async fn wait_for_registration<F>(
    client: &dyn ClientHandle,
    cfg: &RegistrationConfig,
    mut on_progress: F,
) -> Result<RegistrationProgress, SessionError>
where
    F: FnMut(&RegistrationProgress),
{
    let deadline = Instant::now() + Duration::from_millis(cfg.timeout_ms);
    let interval = Duration::from_millis(cfg.poll_interval_ms.max(1));

    loop {
        let (registered, total) = client
            .node_registration_status()
            .await
            .map_err(SessionError::NetworkTimeout)?;
        let progress = RegistrationProgress { registered, total };
        tracing::debug!(registered, total, "node registration progress");
        on_progress(&progress);

        if progress.is_ready(cfg.readiness_threshold) {
            return Ok(progress);
        }
        if Instant::now() + interval > deadline {
            return Err(SessionError::RegistrationTimeout { registered, total });
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::HealthCallback;
    use crate::error::ClientError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Registering {
        registered: AtomicU32,
        step: u32,
        total: u32,
    }

    #[async_trait]
    impl ClientHandle for Registering {
        fn id(&self) -> i64 {
            1
        }
        fn start_following(&self, _: Duration) -> Result<(), ClientError> {
            Ok(())
        }
        async fn wait_for_network(&self, _: Duration) -> Result<(), ClientError> {
            Ok(())
        }
        fn stop_following(&self) -> Result<(), ClientError> {
            Ok(())
        }
        fn add_health_callback(&self, _: HealthCallback) {}
        fn set_tracking_period(&self, _: Duration) {}
        async fn node_registration_status(&self) -> Result<(u32, u32), ClientError> {
            let now = self.registered.fetch_add(self.step, Ordering::SeqCst);
            Ok((now.min(self.total), self.total))
        }
    }

    fn cfg(timeout_ms: u64) -> RegistrationConfig {
        RegistrationConfig {
            poll_interval_ms: 100,
            readiness_threshold: 0.8,
            timeout_ms,
        }
    }

    #[test]
    fn progress_formatting() {
        let p = RegistrationProgress {
            registered: 1,
            total: 3,
        };
        assert_eq!(p.percent(), 34);
        assert_eq!(p.message(), "1/3 nodes registered");
        assert_eq!(
            RegistrationProgress {
                registered: 0,
                total: 0
            }
            .ratio(),
            0.0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reports_until_threshold() {
        let client = Registering {
            registered: AtomicU32::new(0),
            step: 2,
            total: 10,
        };
        let mut seen = Vec::new();

        let done = wait_for_registration(&client, &cfg(60_000), |p| seen.push(p.registered))
            .await
            .unwrap();

        assert_eq!(done.registered, 8);
        assert_eq!(seen, vec![0, 2, 4, 6, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_timeout() {
        let client = Registering {
            registered: AtomicU32::new(0),
            step: 1,
            total: 100,
        };

        let err = wait_for_registration(&client, &cfg(250), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::RegistrationTimeout { total: 100, .. }
        ));
    }
}
