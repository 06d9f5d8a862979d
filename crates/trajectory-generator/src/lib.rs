//! Trajectory generator for the fleet-sim telemetry load testing tool.
//!
//! This crate produces synthetic, geospatially plausible movement for a
//! simulated device. Every client gets four fixed points of interest derived
//! deterministically from its identity, and its route cycles through them
//! one leg at a time.
//!
//! # Architecture
//!
//! ```text
//! client_id + seed offset
//!        │
//!        ▼
//! ┌─────────────────┐
//! │  generate_pois  │   isolated ChaCha8 RNG, seeded from SHA-256
//! └────────┬────────┘
//!          │ PoiSet (exactly 4)
//!          ▼
//! ┌─────────────────┐        ┌──────────────┐
//! │       Leg       │◄───────│  SpeedModel  │
//! │  (interpolator) │        └──────────────┘
//! └────────┬────────┘
//!          │
//!    ┌─────┴──────────────┐
//!    ▼                    ▼
//! ContinuousStream    BatchPlan
//! (cursor, infinite)  (four legs, precomputed)
//! ```
//!
//! POI generation owns its own RNG. Leg-level randomness (activity, speed,
//! elevation, commute and dwell durations) is drawn from an RNG supplied by
//! the caller, so the two sequences never interleave.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use trajectory_generator::{generate_pois, ContinuousStream, TrajectoryProfile};
//!
//! let profile = TrajectoryProfile::default();
//! let pois = generate_pois("usr7-abc", 0, &profile.poi).unwrap();
//! let mut stream =
//!     ContinuousStream::new(pois, Utc::now(), 2, &profile, StdRng::seed_from_u64(7)).unwrap();
//! let point = stream.next_point().unwrap();
//! println!("{} {} {}", point.lat, point.lon, point.activity);
//! ```

pub mod activity;
pub mod error;
pub mod leg;
pub mod poi;
pub mod point;
pub mod profile;
pub mod stream;

// Re-exports for convenience
pub use activity::{Activity, SpeedBounds, SpeedModel, UNKNOWN_ACTIVITY_SPEED};
pub use error::{GenerationError, ProfileError};
pub use leg::Leg;
pub use poi::{generate_pois, poi_seed, PoiKind, PoiProfile, PoiSet, PointOfInterest, POI_COUNT};
pub use point::TrajectoryPoint;
pub use profile::{BatchProfile, CommuteBounds, ContinuousProfile, TrajectoryProfile};
pub use stream::{BatchPlan, ContinuousStream, StreamMode, TrajectoryStream};
