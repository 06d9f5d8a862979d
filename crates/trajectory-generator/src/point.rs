//! Trajectory point emitted by the leg interpolator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::Activity;

/// One sampled position along a client's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub lat: f64,
    pub lon: f64,
    /// Metres, rounded to 2 decimals.
    pub elevation: f64,
    /// km/h, rounded to 2 decimals.
    pub speed: f64,
    pub activity: Activity,
    pub timestamp: DateTime<Utc>,
}

/// Round to 2 decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
