//! Load harness driving many virtual clients.
//!
//! Each client runs in its own tokio task: `start` once, `tick` on a fixed
//! interval, `stop` once when the run ends or the session dies. Clients are
//! spawned gradually at `spawn_rate` per second.

pub mod metrics;
pub mod run;

use std::time::Duration;

use clap::Args;
use telemetry_client::parse_duration;

pub use metrics::{ClientReport, FleetMetrics};
pub use run::{derive_motion_seed, run_client, run_fleet};

/// Arguments controlling how many clients run and for how long.
#[derive(Args, Clone, Debug)]
pub struct FleetArgs {
    /// Number of virtual clients to run
    #[arg(long, default_value = "1")]
    pub clients: usize,

    /// Clients started per second
    #[arg(long, default_value = "1")]
    pub spawn_rate: f64,

    /// Seconds between ticks of each client
    #[arg(long, env = "SEND_INTERVAL_SECONDS", default_value = "1.5")]
    pub send_interval_seconds: f64,

    /// Stop all clients after this long (e.g. "1h", "30m", "300s"); runs until Ctrl-C when omitted
    #[arg(long, value_parser = parse_duration)]
    pub run_time: Option<Duration>,
}

impl FleetArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.clients == 0 {
            anyhow::bail!("--clients must be at least 1");
        }
        if !self.spawn_rate.is_finite() || self.spawn_rate <= 0.0 {
            anyhow::bail!("--spawn-rate must be positive, got {}", self.spawn_rate);
        }
        self.send_interval()?;
        Ok(())
    }

    /// Interval between ticks of one client.
    pub fn send_interval(&self) -> anyhow::Result<Duration> {
        if !self.send_interval_seconds.is_finite() || self.send_interval_seconds <= 0.0 {
            anyhow::bail!(
                "--send-interval-seconds must be positive, got {}",
                self.send_interval_seconds
            );
        }
        Ok(Duration::from_secs_f64(self.send_interval_seconds))
    }

    /// Delay between two client spawns.
    pub fn spawn_delay(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.spawn_rate)
    }
}
