use clap::Parser;
use fleet_sim::{FleetArgs, GenerateArgs, PoisArgs};
use std::time::Duration;
use trajectory_generator::StreamMode;

#[derive(Parser, Debug)]
struct FleetCli {
    #[command(flatten)]
    fleet: FleetArgs,
}

#[derive(Parser, Debug)]
struct GenerateCli {
    #[command(flatten)]
    generate: GenerateArgs,
}

#[derive(Parser, Debug)]
struct PoisCli {
    #[command(flatten)]
    pois: PoisArgs,
}

#[test]
fn test_fleet_args_parsing() {
    let cli = FleetCli::parse_from([
        "test",
        "--clients",
        "25",
        "--spawn-rate",
        "5",
        "--send-interval-seconds",
        "2.5",
        "--run-time",
        "30m",
    ]);

    assert_eq!(cli.fleet.clients, 25);
    assert_eq!(cli.fleet.spawn_rate, 5.0);
    assert_eq!(cli.fleet.send_interval().unwrap(), Duration::from_millis(2500));
    assert_eq!(cli.fleet.run_time, Some(Duration::from_secs(1800)));
    assert_eq!(cli.fleet.spawn_delay(), Duration::from_millis(200));
    assert!(cli.fleet.validate().is_ok());
}

#[test]
fn test_fleet_args_reject_bad_run_time() {
    assert!(FleetCli::try_parse_from(["test", "--run-time", "soon"]).is_err());
}

#[test]
fn test_generate_args_parsing() {
    let cli = GenerateCli::parse_from([
        "test",
        "--client-id",
        "usr7-abc",
        "--mode",
        "batch",
        "--seed-offset",
        "-2",
        "--motion-seed",
        "17",
    ]);

    assert_eq!(cli.generate.common.client_id.as_deref(), Some("usr7-abc"));
    assert_eq!(cli.generate.common.seed_offset, -2);
    assert_eq!(cli.generate.mode, StreamMode::Batch);
    assert_eq!(cli.generate.motion_seed, Some(17));
    assert!(cli.generate.output.is_none());
}

#[test]
fn test_generate_args_reject_zero_points() {
    assert!(GenerateCli::try_parse_from(["test", "--points", "0"]).is_err());
    let cli = GenerateCli::parse_from(["test", "--points", "1"]);
    assert_eq!(cli.generate.points, 1);
}

#[test]
fn test_generate_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trajectory.json");
    let cli = GenerateCli::parse_from([
        "test",
        "--client-id",
        "usr7-abc",
        "--points",
        "10",
        "--motion-seed",
        "1",
        "-o",
        path.to_str().unwrap(),
    ]);

    fleet_sim::generate::run_generate(cli.generate).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let envelope = telemetry_client::Envelope::from_json(&bytes).unwrap();
    assert_eq!(envelope.trajectory.len(), 10);
}

#[test]
fn test_pois_args_with_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.yaml");
    std::fs::write(&path, "poi:\n  reference_lat: 40.0\n  reference_lon: -3.7\n").unwrap();

    let cli = PoisCli::parse_from([
        "test",
        "--client-id",
        "usr7-abc",
        "--profile",
        path.to_str().unwrap(),
    ]);
    assert!(fleet_sim::generate::run_pois(cli.pois).is_ok());
}
