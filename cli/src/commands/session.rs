use std::io::Write;

use haven_core::api::{
    AppEvent, CliError, Password, RegistrationConfig, SessionController, SessionEvent,
    SessionPhase, SessionSnapshot,
};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::cli::SessionUpArgs;
use super::output::Output;

/// Bring a session up by announcing the password on the bus, the same path
/// an interactive login takes, then report where the attempt settled.
pub async fn up<W: Write>(
    controller: &SessionController,
    registration: &RegistrationConfig,
    args: &SessionUpArgs,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    let _listener = controller.start().await;
    let mut events = controller.events();

    let password = Password::from(args.password.as_str());
    if controller.bus().emit(AppEvent::PasswordDecrypted(password)) == 0 {
        return Err(CliError::Session("no session listener registered".into()));
    }

    let generation = controller.generation();
    let settled = wait_settled(&mut events, generation).await?;
    let snapshot = controller
        .wait_for(|s| s.generation == generation && s.phase == settled)
        .await;

    print_snapshot(&snapshot, out)?;
    if snapshot.phase == SessionPhase::Failed {
        let reason = snapshot
            .last_error
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(CliError::Session(reason));
    }

    if args.wait_registration {
        let progress = controller
            .check_registration_readiness(registration, |p| {
                eprintln!("registration {:>3}% ({})", p.percent(), p.message());
            })
            .await
            .map_err(|e| CliError::Session(e.to_string()))?;
        if out.is_json() {
            out.json(&json!({
                "registered": progress.registered,
                "total": progress.total,
                "percent": progress.percent(),
            }))?;
        } else {
            out.line(format_args!("identity ready: {}", progress.message()))?;
        }
    }

    if args.hold {
        hold(controller).await?;
    }

    controller.disconnect();
    Ok(0)
}

/// Wait for attempt `generation` to finish: `Ready` once cipher and cover
/// traffic are in place, or `Failed`.
async fn wait_settled(
    events: &mut broadcast::Receiver<SessionEvent>,
    generation: u64,
) -> Result<SessionPhase, CliError> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Ready { generation: g, .. }) if g == generation => {
                return Ok(SessionPhase::Connected)
            }
            Ok(SessionEvent::Failed { generation: g, .. }) if g == generation => {
                return Ok(SessionPhase::Failed)
            }
            Ok(event) => tracing::debug!(?event, "session event"),
            Err(RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "session event stream lagged");
            }
            Err(RecvError::Closed) => {
                return Err(CliError::Session("session controller went away".into()))
            }
        }
    }
}

/// Log session events until interrupted.
async fn hold(controller: &SessionController) -> Result<(), CliError> {
    let mut events = controller.events();
    tracing::info!("session up, press Ctrl-C to disconnect");
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("interrupt received, disconnecting");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(SessionEvent::HealthChanged { healthy, .. }) => {
                    tracing::info!(healthy, "network health changed");
                }
                Ok(SessionEvent::Failed { error, .. }) => {
                    return Err(CliError::Session(error));
                }
                Ok(event) => tracing::debug!(?event, "session event"),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "session event stream lagged");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

fn print_snapshot<W: Write>(
    snapshot: &SessionSnapshot,
    out: &mut Output<W>,
) -> Result<(), CliError> {
    if out.is_json() {
        let value =
            serde_json::to_value(snapshot).map_err(|e| CliError::Command(e.to_string()))?;
        out.json(&value)?;
        return Ok(());
    }
    out.line(format_args!("phase: {}", snapshot.phase))?;
    out.line(format_args!("network: {:?}", snapshot.network_status))?;
    match snapshot.client_id {
        Some(id) => out.line(format_args!("client: {id}"))?,
        None => out.line("client: none")?,
    }
    out.line(format_args!("cipher: {}", yes_no(snapshot.has_cipher)))?;
    out.line(format_args!(
        "cover traffic: {}",
        if snapshot.cover_traffic_running {
            "running"
        } else if snapshot.has_cover_traffic {
            "paused"
        } else {
            "none"
        }
    ))?;
    if let Some(error) = &snapshot.last_error {
        out.line(format_args!("error: {error}"))?;
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::api::{
        AppConfig, AppContext, LoopbackNetworkConfig, MemoryBackend, MemoryLegacyStorage, Services,
    };
    use haven_plugins::network::LoopbackNetwork;
    use std::sync::Arc;

    fn fast_network() -> LoopbackNetwork {
        LoopbackNetwork::new(LoopbackNetworkConfig {
            ready_after_ms: 5,
            total_nodes: 4,
            nodes_per_poll: 2,
        })
    }

    fn context(dir: &std::path::Path, network: LoopbackNetwork) -> AppContext {
        let mut cfg = AppConfig::default();
        cfg.storage.data_dir = dir.to_string_lossy().into_owned();
        AppContext::from_services(
            cfg,
            Services {
                store_backend: Arc::new(MemoryBackend::new()),
                legacy: Arc::new(MemoryLegacyStorage::new()),
                network: Arc::new(network),
            },
        )
    }

    fn up_args() -> SessionUpArgs {
        SessionUpArgs {
            password: "correct horse".into(),
            wait_registration: false,
            hold: false,
        }
    }

    fn fast_registration() -> RegistrationConfig {
        RegistrationConfig {
            poll_interval_ms: 5,
            readiness_threshold: 0.8,
            timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn up_connects_then_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let network = fast_network();
        let ctx = context(dir.path(), network);
        ctx.startup().await;
        let controller = ctx.session_controller().await;

        let mut out = Output::buffer(false);
        let code = up(&controller, &fast_registration(), &up_args(), &mut out)
            .await
            .unwrap();

        assert_eq!(code, 0);
        let text = out.text();
        assert!(text.starts_with("phase: connected\n"), "{text}");
        assert!(text.contains("cipher: yes\n"));
        assert!(text.contains("cover traffic: running\n"));
        assert_eq!(controller.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn up_waits_for_registration() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), fast_network());
        let controller = ctx.session_controller().await;
        let args = SessionUpArgs {
            wait_registration: true,
            ..up_args()
        };

        let mut out = Output::buffer(false);
        up(&controller, &fast_registration(), &args, &mut out)
            .await
            .unwrap();

        assert!(out.text().contains("identity ready: "));
    }

    #[tokio::test]
    async fn failed_bring_up_is_a_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let network = fast_network();
        network.set_fail_create(true);
        let ctx = context(dir.path(), network);
        let controller = ctx.session_controller().await;

        let mut out = Output::buffer(true);
        let err = up(&controller, &fast_registration(), &up_args(), &mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, CliError::Session(_)));
        let value: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(value["phase"], "failed");
    }
}
