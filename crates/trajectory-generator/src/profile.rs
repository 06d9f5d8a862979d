//! Trajectory profile: the tunable constants shared by both stream modes.
//!
//! Profiles are loaded from YAML. Every section is optional and falls back to
//! the defaults below.
//!
//! ```yaml
//! poi:
//!   reference_lat: 59.3
//!   reference_lon: 18.0
//!   jitter: 0.05
//! speeds:
//!   driving: { min: 30, max: 90 }
//! continuous:
//!   commute: { min_minutes: 8, max_minutes: 45 }
//!   dwell_minutes: [15, 30, 45, 60, 90, 120]
//! batch:
//!   commute: { min_minutes: 10, max_minutes: 75 }
//!   schedule_minutes: [480, 580, 120, 60]
//! ```

use std::fs;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activity::SpeedModel;
use crate::error::{GenerationError, ProfileError};
use crate::poi::{PoiProfile, POI_COUNT};

/// Inclusive commute duration range in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommuteBounds {
    pub min_minutes: u32,
    pub max_minutes: u32,
}

impl CommuteBounds {
    pub const fn new(min_minutes: u32, max_minutes: u32) -> Self {
        Self {
            min_minutes,
            max_minutes,
        }
    }

    /// Draw a commute duration uniformly from the range.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min_minutes..=self.max_minutes)
    }

    pub fn contains(&self, minutes: u32) -> bool {
        (self.min_minutes..=self.max_minutes).contains(&minutes)
    }

    fn validate(&self, name: &str) -> Result<(), GenerationError> {
        if self.min_minutes == 0 || self.min_minutes > self.max_minutes {
            return Err(GenerationError::InvalidRange {
                name: name.to_string(),
                min: f64::from(self.min_minutes),
                max: f64::from(self.max_minutes),
            });
        }
        Ok(())
    }
}

/// Parameters of the infinite, one-point-per-tick stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousProfile {
    pub commute: CommuteBounds,
    /// Dwell durations (minutes) at a POI between legs, picked uniformly.
    pub dwell_minutes: Vec<u32>,
}

impl Default for ContinuousProfile {
    fn default() -> Self {
        Self {
            commute: CommuteBounds::new(8, 45),
            dwell_minutes: vec![15, 30, 45, 60, 90, 120],
        }
    }
}

impl ContinuousProfile {
    /// Draw a dwell duration from the dwell set.
    pub fn sample_dwell<R: Rng>(&self, rng: &mut R) -> Result<u32, GenerationError> {
        self.dwell_minutes
            .choose(rng)
            .copied()
            .ok_or(GenerationError::EmptyDwellSet)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        self.commute.validate("continuous commute")?;
        if self.dwell_minutes.is_empty() {
            return Err(GenerationError::EmptyDwellSet);
        }
        Ok(())
    }
}

/// Parameters of the precomputed full-day trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchProfile {
    pub commute: CommuteBounds,
    /// Minutes spent at home, work, gym and errands, in that order.
    pub schedule_minutes: Vec<u32>,
    /// Minutes between consecutive points of the day, independent of the
    /// continuous stream's interval.
    pub interval_minutes: u32,
}

impl Default for BatchProfile {
    fn default() -> Self {
        Self {
            commute: CommuteBounds::new(10, 75),
            schedule_minutes: vec![480, 580, 120, 60],
            interval_minutes: 15,
        }
    }
}

impl BatchProfile {
    pub fn validate(&self) -> Result<(), GenerationError> {
        self.commute.validate("batch commute")?;
        if self.interval_minutes == 0 {
            return Err(GenerationError::NonPositiveInterval);
        }
        if self.schedule_minutes.len() != POI_COUNT {
            return Err(GenerationError::ScheduleLength {
                expected: POI_COUNT,
                actual: self.schedule_minutes.len(),
            });
        }
        Ok(())
    }
}

/// All tunables for trajectory synthesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryProfile {
    pub poi: PoiProfile,
    pub speeds: SpeedModel,
    pub continuous: ContinuousProfile,
    pub batch: BatchProfile,
}

impl TrajectoryProfile {
    /// Load a profile from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a profile from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ProfileError> {
        let profile: TrajectoryProfile = serde_yaml::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        self.poi.validate()?;
        self.speeds.validate()?;
        self.continuous.validate()?;
        self.batch.validate()
    }
}
