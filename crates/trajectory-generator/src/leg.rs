//! Leg interpolation between two points of interest.
//!
//! A leg covers the half-open segment `[start, end)`: it emits `steps`
//! points starting at `start` and never the destination itself, which
//! becomes the first point of the following leg.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::activity::{Activity, SpeedModel};
use crate::error::GenerationError;
use crate::poi::PointOfInterest;
use crate::point::{round2, TrajectoryPoint};

/// Elevation range in metres.
const ELEVATION_MIN: f64 = 0.0;
const ELEVATION_MAX: f64 = 50.0;

/// A planned leg: activity, step count and geometry are fixed up front,
/// per-point elevation and speed are drawn when a point is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    start: PointOfInterest,
    lat_step: f64,
    lon_step: f64,
    start_timestamp: DateTime<Utc>,
    interval_minutes: u32,
    steps: u32,
    activity: Activity,
}

impl Leg {
    /// Plan a leg, picking one random activity for its whole length.
    ///
    /// `steps = max(duration_minutes / interval_minutes, 1)`.
    pub fn plan<R: Rng>(
        start: PointOfInterest,
        end: PointOfInterest,
        start_timestamp: DateTime<Utc>,
        duration_minutes: u32,
        interval_minutes: u32,
        rng: &mut R,
    ) -> Result<Self, GenerationError> {
        let activity = Activity::random(rng);
        Self::plan_with_activity(
            start,
            end,
            start_timestamp,
            duration_minutes,
            interval_minutes,
            activity,
        )
    }

    /// Plan a leg with a fixed activity.
    pub fn plan_with_activity(
        start: PointOfInterest,
        end: PointOfInterest,
        start_timestamp: DateTime<Utc>,
        duration_minutes: u32,
        interval_minutes: u32,
        activity: Activity,
    ) -> Result<Self, GenerationError> {
        if duration_minutes == 0 {
            return Err(GenerationError::NonPositiveDuration);
        }
        if interval_minutes == 0 {
            return Err(GenerationError::NonPositiveInterval);
        }

        let steps = (duration_minutes / interval_minutes).max(1);
        let lat_step = (end.lat - start.lat) / f64::from(steps);
        let lon_step = (end.lon - start.lon) / f64::from(steps);

        Ok(Self {
            start,
            lat_step,
            lon_step,
            start_timestamp,
            interval_minutes,
            steps,
            activity,
        })
    }

    /// Number of points this leg emits.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.start_timestamp
    }

    /// Timestamp one interval after the last emitted point.
    pub fn end_timestamp(&self) -> DateTime<Utc> {
        self.timestamp_at(self.steps)
    }

    fn timestamp_at(&self, step: u32) -> DateTime<Utc> {
        self.start_timestamp + Duration::minutes(i64::from(self.interval_minutes) * i64::from(step))
    }

    /// Produce the point at `step`, or `None` once the leg is exhausted.
    pub fn point_at<R: Rng>(
        &self,
        step: u32,
        speeds: &SpeedModel,
        rng: &mut R,
    ) -> Option<TrajectoryPoint> {
        if step >= self.steps {
            return None;
        }

        let progress = f64::from(step);
        Some(TrajectoryPoint {
            lat: self.start.lat + self.lat_step * progress,
            lon: self.start.lon + self.lon_step * progress,
            elevation: round2(rng.gen_range(ELEVATION_MIN..=ELEVATION_MAX)),
            speed: speeds.sample(self.activity, rng),
            activity: self.activity,
            timestamp: self.timestamp_at(step),
        })
    }

    /// Produce every point of the leg in order.
    pub fn points<R: Rng>(&self, speeds: &SpeedModel, rng: &mut R) -> Vec<TrajectoryPoint> {
        (0..self.steps)
            .filter_map(|step| self.point_at(step, speeds, rng))
            .collect()
    }
}
