//! Offline trajectory inspection commands.
//!
//! `generate` writes an envelope exactly as a client would publish it, and
//! `pois` prints a client's four points of interest. Neither touches a broker.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use telemetry_client::{ClientIdentity, Envelope, SessionWindow};
use trajectory_generator::{
    generate_pois, poi_seed, PoiKind, StreamMode, TrajectoryProfile, TrajectoryStream,
};

/// Arguments shared by the offline commands.
#[derive(Args, Clone, Debug)]
pub struct ProfileArgs {
    /// Client id to generate for (a random identity is drawn when omitted)
    #[arg(long)]
    pub client_id: Option<String>,

    /// Offset mixed into the POI seed
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub seed_offset: i64,

    /// Path to a trajectory profile YAML file
    #[arg(long)]
    pub profile: Option<PathBuf>,
}

impl ProfileArgs {
    fn load_profile(&self) -> anyhow::Result<TrajectoryProfile> {
        match &self.profile {
            Some(path) => TrajectoryProfile::from_file(path)
                .with_context(|| format!("Failed to load trajectory profile from {path:?}")),
            None => Ok(TrajectoryProfile::default()),
        }
    }
}

/// Arguments for `fleet-sim generate`.
#[derive(Args, Clone, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub common: ProfileArgs,

    /// Trajectory mode: continuous or batch
    #[arg(long, default_value = "continuous")]
    pub mode: StreamMode,

    /// Number of points to emit in continuous mode (at least 1)
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(1..))]
    pub points: u64,

    /// Minutes between consecutive points in continuous mode (batch mode uses the profile's batch interval)
    #[arg(long, env = "POINT_INTERVAL_MIN", default_value = "2")]
    pub point_interval_min: u32,

    /// Length of the reported session window in hours
    #[arg(long, env = "SESSION_HOURS", default_value = "26")]
    pub session_hours: f64,

    /// Seed for motion randomness (random when omitted)
    #[arg(long)]
    pub motion_seed: Option<u64>,

    /// Write the envelope to this file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for `fleet-sim pois`.
#[derive(Args, Clone, Debug)]
pub struct PoisArgs {
    #[command(flatten)]
    pub common: ProfileArgs,
}

#[derive(Debug, Serialize)]
struct PoiReport {
    client_id: String,
    seed_offset: i64,
    seed: u64,
    pois: Vec<NamedPoi>,
}

#[derive(Debug, Serialize)]
struct NamedPoi {
    kind: &'static str,
    lat: f64,
    lon: f64,
}

/// Build one envelope holding the generated trajectory.
pub fn generate_envelope(args: &GenerateArgs) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(args.points > 0, "--points must be at least 1");
    let profile = args.common.load_profile()?;
    let mut rng = match args.motion_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let identity = match &args.common.client_id {
        Some(client_id) => ClientIdentity::new(client_id.clone(), 1000),
        None => ClientIdentity::random(&mut rng),
    };
    let window = SessionWindow::ending_now(args.session_hours)?;

    let pois = generate_pois(&identity.client_id, args.common.seed_offset, &profile.poi)?;
    let stream = TrajectoryStream::build(
        args.mode,
        pois,
        window.start,
        args.point_interval_min,
        &profile,
        rng,
    )?;
    let points = match stream {
        TrajectoryStream::Continuous(mut stream) => (0..args.points)
            .map(|_| stream.next_point())
            .collect::<Result<Vec<_>, _>>()?,
        TrajectoryStream::Batch(points) => points,
    };
    tracing::info!(
        client_id = %identity.client_id,
        mode = %args.mode,
        points = points.len(),
        "Generated trajectory"
    );

    let envelope = Envelope::new(&identity, &window, &points);
    let bytes = if args.pretty {
        serde_json::to_vec_pretty(&envelope)?
    } else {
        envelope.to_json()?
    };
    Ok(bytes)
}

/// Run the generate command.
pub fn run_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let bytes = generate_envelope(&args)?;
    write_output(args.output.as_deref(), &bytes)
}

/// Run the pois command.
pub fn run_pois(args: PoisArgs) -> anyhow::Result<()> {
    let profile = args.common.load_profile()?;
    let client_id = match &args.common.client_id {
        Some(client_id) => client_id.clone(),
        None => ClientIdentity::random(&mut StdRng::from_entropy()).client_id,
    };
    let pois = generate_pois(&client_id, args.common.seed_offset, &profile.poi)?;

    let report = PoiReport {
        seed: poi_seed(&client_id, args.common.seed_offset),
        client_id,
        seed_offset: args.common.seed_offset,
        pois: PoiKind::ALL
            .iter()
            .map(|kind| {
                let poi = pois.kind(*kind);
                NamedPoi {
                    kind: kind.as_str(),
                    lat: poi.lat,
                    lon: poi.lon,
                }
            })
            .collect(),
    };
    let bytes = serde_json::to_vec_pretty(&report)?;
    write_output(None, &bytes)
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes)
                .with_context(|| format!("Failed to write output file: {path:?}"))?;
            tracing::info!("Wrote {} bytes to {:?}", bytes.len(), path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_args(mode: StreamMode) -> GenerateArgs {
        GenerateArgs {
            common: ProfileArgs {
                client_id: Some("usr7-abc".to_string()),
                seed_offset: 0,
                profile: None,
            },
            mode,
            points: 25,
            point_interval_min: 2,
            session_hours: 26.0,
            motion_seed: Some(1),
            output: None,
            pretty: false,
        }
    }

    #[test]
    fn test_generate_continuous_envelope() {
        let bytes = generate_envelope(&generate_args(StreamMode::Continuous)).unwrap();
        let envelope = Envelope::from_json(&bytes).unwrap();

        assert_eq!(envelope.client_id, "usr7-abc");
        assert_eq!(envelope.trajectory.len(), 25);
        assert!(envelope
            .trajectory
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[test]
    fn test_generate_batch_envelope() {
        let args = generate_args(StreamMode::Batch);
        let bytes = generate_envelope(&args).unwrap();
        let envelope = Envelope::from_json(&bytes).unwrap();

        assert!(envelope.trajectory.len() >= 4);
    }

    #[test]
    fn test_generate_rejects_zero_points() {
        let mut args = generate_args(StreamMode::Continuous);
        args.points = 0;
        let err = generate_envelope(&args).unwrap_err();
        assert!(err.to_string().contains("--points"));
    }

    #[test]
    fn test_generate_rejects_zero_interval() {
        let mut args = generate_args(StreamMode::Continuous);
        args.point_interval_min = 0;
        assert!(generate_envelope(&args).is_err());
    }
}
