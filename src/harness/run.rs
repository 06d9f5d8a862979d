//! Fleet runner.

use std::sync::Arc;
use std::time::Duration;

use telemetry_client::{SessionSettings, TickOutcome, Transport, VirtualClient};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ClientReport, FleetArgs, FleetMetrics};

/// Per-client motion seed derived from a run-wide base seed.
pub fn derive_motion_seed(base: u64, index: u64) -> u64 {
    base.wrapping_add(index.wrapping_mul(0x9E3779B97F4A7C15))
}

/// Drive one client until `shutdown` fires or its session ends.
///
/// Cancellation is only observed between ticks, so a tick in progress always
/// completes before `stop` runs.
pub async fn run_client<T: Transport>(
    index: usize,
    mut client: VirtualClient<T>,
    send_interval: Duration,
    shutdown: CancellationToken,
) -> ClientReport {
    let mut fatal = None;

    match client.start().await {
        Ok(()) => {
            let mut ticker = tokio::time::interval(send_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => match client.tick().await {
                        Ok(TickOutcome::Stopped) => break,
                        Ok(_) => {}
                        Err(e) => {
                            fatal = Some(e.to_string());
                            break;
                        }
                    },
                }
            }
        }
        Err(e) => fatal = Some(e.to_string()),
    }
    client.stop().await;

    ClientReport {
        index,
        client_id: client.identity().map(|identity| identity.client_id.clone()),
        stats: client.stats(),
        fatal,
    }
}

/// Spawn `args.clients` virtual clients and run them until the run time
/// elapses, `shutdown` is cancelled, or every session has ended.
///
/// `make_transport` is called once per client with the client's index.
pub async fn run_fleet<T, F>(
    settings: Arc<SessionSettings>,
    args: &FleetArgs,
    motion_seed: Option<u64>,
    mut make_transport: F,
    shutdown: CancellationToken,
) -> anyhow::Result<FleetMetrics>
where
    T: Transport + 'static,
    F: FnMut(usize) -> T,
{
    args.validate()?;
    let send_interval = args.send_interval()?;
    let spawn_delay = args.spawn_delay();
    let started = Instant::now();
    let run_token = shutdown.child_token();

    if let Some(run_time) = args.run_time {
        let token = run_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(run_time) => {
                    info!("Run time of {:?} elapsed, stopping clients", run_time);
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        });
    }

    info!(
        clients = args.clients,
        spawn_rate = args.spawn_rate,
        mode = %settings.mode,
        broker = %settings.broker,
        "Starting fleet"
    );

    let mut tasks = JoinSet::new();
    for index in 0..args.clients {
        if run_token.is_cancelled() {
            break;
        }
        let mut client = VirtualClient::new(Arc::clone(&settings), make_transport(index));
        if let Some(base) = motion_seed {
            client = client.with_motion_seed(derive_motion_seed(base, index as u64));
        }
        tasks.spawn(run_client(
            index,
            client,
            send_interval,
            run_token.child_token(),
        ));
        debug!(index, "Spawned client");

        if index + 1 < args.clients {
            tokio::select! {
                _ = run_token.cancelled() => break,
                _ = tokio::time::sleep(spawn_delay) => {}
            }
        }
    }
    info!(clients = tasks.len(), "Clients spawned");

    let mut metrics = FleetMetrics::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => {
                if let Some(reason) = &report.fatal {
                    warn!(
                        index = report.index,
                        client_id = report.client_id.as_deref().unwrap_or("-"),
                        "Session ended early: {reason}"
                    );
                }
                metrics.record(&report);
            }
            Err(e) => error!(error = %e, "Client task failed"),
        }
    }
    run_token.cancel();
    metrics.total_duration = started.elapsed();
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_client::testing::MockTransport;

    fn fleet_args(clients: usize, run_time: Option<Duration>) -> FleetArgs {
        FleetArgs {
            clients,
            spawn_rate: 10.0,
            send_interval_seconds: 1.0,
            run_time,
        }
    }

    #[test]
    fn test_derive_motion_seed() {
        assert_eq!(derive_motion_seed(42, 0), 42);
        assert_ne!(derive_motion_seed(42, 1), derive_motion_seed(42, 2));
        assert_eq!(derive_motion_seed(42, 7), derive_motion_seed(42, 7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fleet_runs_until_run_time() {
        let mut handles = Vec::new();
        let metrics = run_fleet(
            Arc::new(SessionSettings::default()),
            &fleet_args(3, Some(Duration::from_secs(5))),
            Some(7),
            |_| {
                let transport = MockTransport::counting();
                handles.push(transport.clone());
                transport
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(metrics.clients_spawned, 3);
        assert_eq!(metrics.sessions_fatal, 0);
        assert!(metrics.messages_published >= 3);
        assert_eq!(metrics.messages_published, metrics.points_published);
        assert_eq!(handles.len(), 3);
        for handle in handles {
            let calls = handle.calls();
            assert_eq!(calls.connect, 1);
            assert_eq!(calls.disconnect, 1);
            assert!(calls.publish > 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_sessions_end_the_run() {
        let settings = SessionSettings {
            topic_template: "client/{unknown}/".to_string(),
            ..SessionSettings::default()
        };
        let metrics = run_fleet(
            Arc::new(settings),
            &fleet_args(2, None),
            None,
            |_| MockTransport::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(metrics.clients_spawned, 2);
        assert_eq!(metrics.sessions_fatal, 2);
        assert_eq!(metrics.messages_published, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_stops_clients() {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let metrics = run_fleet(
            Arc::new(SessionSettings::default()),
            &fleet_args(1, None),
            None,
            |_| MockTransport::counting(),
            shutdown,
        )
        .await
        .unwrap();

        assert_eq!(metrics.clients_spawned, 1);
        assert!(metrics.messages_published >= 3);
    }

    #[test]
    fn test_fleet_args_validation() {
        assert!(fleet_args(0, None).validate().is_err());
        let mut args = fleet_args(1, None);
        args.spawn_rate = 0.0;
        assert!(args.validate().is_err());
        let mut args = fleet_args(1, None);
        args.send_interval_seconds = -1.0;
        assert!(args.validate().is_err());
        assert!(fleet_args(1, None).validate().is_ok());
    }
}
