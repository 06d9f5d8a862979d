//! Command-line interface for fleet-sim
//!
//! # Usage Examples
//!
//! ## Load Test
//! ```bash
//! # Continuous mode: one point per client every 1.5 s
//! fleet-sim run \
//!   --clients 100 --spawn-rate 10 --run-time 1h \
//!   --mqtt-broker broker.local --mqtt-port 1883
//!
//! # Batch mode: republish a full-day trajectory every 2 s
//! fleet-sim run --mode batch --point-interval-min 15 \
//!   --clients 20 --send-interval-seconds 2
//!
//! # Exercise the harness without a broker
//! fleet-sim run --dry-run --clients 5 --run-time 30s
//! ```
//!
//! ## Inspection
//! ```bash
//! fleet-sim generate --client-id usr7-abc --points 500 -o trajectory.json
//! fleet-sim pois --client-id usr7-abc --seed-offset 3
//! ```
//!
//! Every session flag can also be set through the environment
//! (`MQTT_BROKER`, `MQTT_PORT`, `MQTT_TOPIC_TEMPLATE`, `SESSION_HOURS`,
//! `POINT_INTERVAL_MIN`, `SEND_INTERVAL_SECONDS`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fleet_sim::generate::{run_generate, run_pois};
use fleet_sim::harness::run_fleet;
use fleet_sim::{FleetArgs, GenerateArgs, PoisArgs};
use telemetry_client::testing::MockTransport;
use telemetry_client::{parse_duration, SessionArgs};
use telemetry_client_mqtt::{MqttConfig, MqttTransport};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "fleet-sim")]
#[command(about = "Simulate a fleet of IoT devices publishing GPS trajectories over MQTT")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run virtual clients against an MQTT broker
    Run {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        fleet: FleetArgs,

        /// How long to wait for the broker to accept a connection
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        connect_timeout: Duration,

        /// Write the final metrics as JSON to this file
        #[arg(long, value_name = "PATH")]
        metrics_file: Option<PathBuf>,

        /// Publish to an in-memory transport instead of a broker
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate one client's trajectory and print the envelope
    Generate(GenerateArgs),

    /// Print one client's points of interest
    Pois(PoisArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            session,
            fleet,
            connect_timeout,
            metrics_file,
            dry_run,
        } => {
            run_load(
                session,
                fleet,
                connect_timeout,
                metrics_file,
                dry_run,
            )
            .await
        }
        Commands::Generate(args) => run_generate(args),
        Commands::Pois(args) => run_pois(args),
    }
}

async fn run_load(
    session: SessionArgs,
    fleet: FleetArgs,
    connect_timeout: Duration,
    metrics_file: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let settings = Arc::new(
        session
            .to_settings()
            .context("Invalid session configuration")?,
    );
    fleet.validate()?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, stopping clients");
            ctrl_c.cancel();
        }
    });

    let metrics = if dry_run {
        tracing::info!("[DRY-RUN] Publishing to an in-memory transport, no broker connection");
        run_fleet(
            settings,
            &fleet,
            session.motion_seed,
            |_| MockTransport::counting(),
            shutdown,
        )
        .await?
    } else {
        let config = MqttConfig {
            connect_timeout,
            ..MqttConfig::default()
        };
        run_fleet(
            settings,
            &fleet,
            session.motion_seed,
            |_| MqttTransport::new(config.clone()),
            shutdown,
        )
        .await?
    };

    metrics.log_summary();
    if let Some(path) = metrics_file {
        let json = serde_json::to_string_pretty(&metrics)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write metrics file: {path:?}"))?;
        tracing::info!("Wrote metrics to {:?}", path);
    }
    Ok(())
}
