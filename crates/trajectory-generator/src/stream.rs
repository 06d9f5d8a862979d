//! Trajectory streams built from legs.
//!
//! Both modes share the [`Leg`] primitive and the [`TrajectoryProfile`]
//! constants; they differ only in how legs are sequenced and when points are
//! produced.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activity::SpeedModel;
use crate::error::GenerationError;
use crate::leg::Leg;
use crate::poi::{PoiSet, POI_COUNT};
use crate::point::TrajectoryPoint;
use crate::profile::{BatchProfile, ContinuousProfile, TrajectoryProfile};

/// How a session emits its trajectory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// One point per tick, forever.
    #[default]
    Continuous,
    /// The whole precomputed day in every tick.
    Batch,
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamMode::Continuous => f.write_str("continuous"),
            StreamMode::Batch => f.write_str("batch"),
        }
    }
}

impl FromStr for StreamMode {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continuous" | "stream" => Ok(StreamMode::Continuous),
            "batch" => Ok(StreamMode::Batch),
            other => Err(GenerationError::UnknownMode(other.to_string())),
        }
    }
}

/// Leg currently being emitted by a [`ContinuousStream`].
#[derive(Debug, Clone)]
struct ActiveLeg {
    leg: Leg,
    commute_minutes: u32,
    next_step: u32,
}

/// Infinite, pull-based stream cycling through a client's POIs.
///
/// The cursor is `{leg_index, clock, active leg, next step}`. When a leg runs
/// out of points the clock advances by the leg's commute plus a dwell drawn
/// from the dwell set, and the next leg starts from the following POI.
pub struct ContinuousStream<R> {
    pois: PoiSet,
    profile: ContinuousProfile,
    speeds: SpeedModel,
    interval_minutes: u32,
    rng: R,
    leg_index: u64,
    clock: DateTime<Utc>,
    active: Option<ActiveLeg>,
}

impl<R: Rng> ContinuousStream<R> {
    /// Create a stream starting at `start` from the first POI.
    pub fn new(
        pois: PoiSet,
        start: DateTime<Utc>,
        interval_minutes: u32,
        profile: &TrajectoryProfile,
        rng: R,
    ) -> Result<Self, GenerationError> {
        if interval_minutes == 0 {
            return Err(GenerationError::NonPositiveInterval);
        }
        profile.continuous.validate()?;
        profile.speeds.validate()?;

        Ok(Self {
            pois,
            profile: profile.continuous.clone(),
            speeds: profile.speeds.clone(),
            interval_minutes,
            rng,
            leg_index: 0,
            clock: start,
            active: None,
        })
    }

    /// Pull the next point, planning a new leg when the current one is done.
    pub fn next_point(&mut self) -> Result<TrajectoryPoint, GenerationError> {
        loop {
            if let Some(active) = self.active.as_mut() {
                if let Some(point) =
                    active
                        .leg
                        .point_at(active.next_step, &self.speeds, &mut self.rng)
                {
                    active.next_step += 1;
                    return Ok(point);
                }

                let commute = active.commute_minutes;
                let dwell = self.profile.sample_dwell(&mut self.rng)?;
                self.clock += Duration::minutes(i64::from(commute) + i64::from(dwell));
                self.leg_index += 1;
                self.active = None;
            }

            self.active = Some(self.plan_leg()?);
        }
    }

    fn plan_leg(&mut self) -> Result<ActiveLeg, GenerationError> {
        let position = (self.leg_index % POI_COUNT as u64) as usize;
        let start = self.pois.get(position);
        let end = self.pois.get(position + 1);
        let commute_minutes = self.profile.commute.sample(&mut self.rng);

        let leg = Leg::plan(
            start,
            end,
            self.clock,
            commute_minutes,
            self.interval_minutes,
            &mut self.rng,
        )?;

        Ok(ActiveLeg {
            leg,
            commute_minutes,
            next_step: 0,
        })
    }

    /// Number of legs fully completed so far.
    pub fn leg_index(&self) -> u64 {
        self.leg_index
    }

    /// Start time of the current (or next) leg.
    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    /// Points left in the current leg.
    pub fn remaining_in_leg(&self) -> u32 {
        self.active
            .as_ref()
            .map(|active| active.leg.steps() - active.next_step)
            .unwrap_or(0)
    }

    pub fn pois(&self) -> &PoiSet {
        &self.pois
    }
}

impl<R: Rng> Iterator for ContinuousStream<R> {
    type Item = TrajectoryPoint;

    /// Never returns `None` for a stream built by [`ContinuousStream::new`]:
    /// every error `next_point` can raise comes from a profile value that
    /// `new` validates. Call `next_point` directly to observe errors.
    fn next(&mut self) -> Option<Self::Item> {
        self.next_point().ok()
    }
}

impl<R> fmt::Debug for ContinuousStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuousStream")
            .field("leg_index", &self.leg_index)
            .field("clock", &self.clock)
            .field("interval_minutes", &self.interval_minutes)
            .finish()
    }
}

/// The four legs of a full simulated day.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    legs: Vec<Leg>,
}

impl BatchPlan {
    /// Plan one leg per POI transition, each with an independent commute,
    /// sampled every `profile.interval_minutes`.
    ///
    /// After leg `i` the clock advances by its commute plus
    /// `schedule_minutes[i]`.
    pub fn plan<R: Rng>(
        pois: &PoiSet,
        start: DateTime<Utc>,
        profile: &BatchProfile,
        rng: &mut R,
    ) -> Result<Self, GenerationError> {
        profile.validate()?;

        let mut clock = start;
        let mut legs = Vec::with_capacity(POI_COUNT);

        for (i, dwell) in profile.schedule_minutes.iter().enumerate() {
            let commute = profile.commute.sample(rng);
            let leg = Leg::plan(
                pois.get(i),
                pois.get(i + 1),
                clock,
                commute,
                profile.interval_minutes,
                rng,
            )?;
            legs.push(leg);
            clock += Duration::minutes(i64::from(commute) + i64::from(*dwell));
        }

        Ok(Self { legs })
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Sum of the legs' step counts.
    pub fn total_points(&self) -> usize {
        self.legs.iter().map(|leg| leg.steps() as usize).sum()
    }

    /// Materialise every leg, concatenated in order.
    pub fn trajectory<R: Rng>(&self, speeds: &SpeedModel, rng: &mut R) -> Vec<TrajectoryPoint> {
        let mut points = Vec::with_capacity(self.total_points());
        for leg in &self.legs {
            points.extend(leg.points(speeds, rng));
        }
        points
    }
}

/// A session's trajectory source in either mode.
pub enum TrajectoryStream<R> {
    Continuous(ContinuousStream<R>),
    Batch(Vec<TrajectoryPoint>),
}

impl<R: Rng> TrajectoryStream<R> {
    /// Build the stream for `mode`. Batch mode computes the full day here.
    ///
    /// `interval_minutes` is the continuous stream's sampling interval; the
    /// batch day is sampled at `profile.batch.interval_minutes`.
    pub fn build(
        mode: StreamMode,
        pois: PoiSet,
        start: DateTime<Utc>,
        interval_minutes: u32,
        profile: &TrajectoryProfile,
        mut rng: R,
    ) -> Result<Self, GenerationError> {
        match mode {
            StreamMode::Continuous => Ok(TrajectoryStream::Continuous(ContinuousStream::new(
                pois,
                start,
                interval_minutes,
                profile,
                rng,
            )?)),
            StreamMode::Batch => {
                profile.speeds.validate()?;
                let plan = BatchPlan::plan(&pois, start, &profile.batch, &mut rng)?;
                Ok(TrajectoryStream::Batch(plan.trajectory(&profile.speeds, &mut rng)))
            }
        }
    }

    pub fn mode(&self) -> StreamMode {
        match self {
            TrajectoryStream::Continuous(_) => StreamMode::Continuous,
            TrajectoryStream::Batch(_) => StreamMode::Batch,
        }
    }
}

impl<R> fmt::Debug for TrajectoryStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrajectoryStream::Continuous(stream) => fmt::Debug::fmt(stream, f),
            TrajectoryStream::Batch(points) => f
                .debug_struct("Batch")
                .field("points", &points.len())
                .finish(),
        }
    }
}
