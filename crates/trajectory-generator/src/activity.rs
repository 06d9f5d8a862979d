//! Activity tags and the speed model.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::point::round2;

/// Speed reported for an activity tag the model does not recognise.
pub const UNKNOWN_ACTIVITY_SPEED: f64 = 1.0;

/// How a client is moving during a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Walking,
    Cycling,
    Driving,
    PublicTransport,
}

impl Activity {
    /// Every activity a leg can be assigned.
    pub const ALL: [Activity; 4] = [
        Activity::Walking,
        Activity::Cycling,
        Activity::Driving,
        Activity::PublicTransport,
    ];

    /// Wire name of the activity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Walking => "walking",
            Activity::Cycling => "cycling",
            Activity::Driving => "driving",
            Activity::PublicTransport => "public_transport",
        }
    }

    /// Pick an activity uniformly at random.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activity {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|activity| activity.as_str() == s)
            .ok_or_else(|| GenerationError::UnknownActivity(s.to_string()))
    }
}

/// Inclusive speed range in km/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBounds {
    pub min: f64,
    pub max: f64,
}

impl SpeedBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, speed: f64) -> bool {
        (self.min..=self.max).contains(&speed)
    }

    fn validate(&self, activity: Activity) -> Result<(), GenerationError> {
        let valid = self.min.is_finite()
            && self.max.is_finite()
            && self.min >= 0.0
            && self.min <= self.max;
        if valid {
            Ok(())
        } else {
            Err(GenerationError::InvalidRange {
                name: format!("{activity} speed"),
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Per-activity speed ranges.
///
/// Samples are drawn uniformly from the activity's range and rounded to two
/// decimals, so they always stay inside the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedModel {
    pub walking: SpeedBounds,
    pub cycling: SpeedBounds,
    pub driving: SpeedBounds,
    pub public_transport: SpeedBounds,
}

impl Default for SpeedModel {
    fn default() -> Self {
        Self {
            walking: SpeedBounds::new(1.0, 5.0),
            cycling: SpeedBounds::new(8.0, 25.0),
            driving: SpeedBounds::new(30.0, 120.0),
            public_transport: SpeedBounds::new(20.0, 80.0),
        }
    }
}

impl SpeedModel {
    /// Range used for the given activity.
    pub fn bounds(&self, activity: Activity) -> SpeedBounds {
        match activity {
            Activity::Walking => self.walking,
            Activity::Cycling => self.cycling,
            Activity::Driving => self.driving,
            Activity::PublicTransport => self.public_transport,
        }
    }

    /// Draw a speed for a known activity.
    pub fn sample<R: Rng>(&self, activity: Activity, rng: &mut R) -> f64 {
        let bounds = self.bounds(activity);
        round2(rng.gen_range(bounds.min..=bounds.max))
    }

    /// Draw a speed for a raw activity tag.
    ///
    /// Unknown tags yield [`UNKNOWN_ACTIVITY_SPEED`] without consuming randomness.
    pub fn sample_tag<R: Rng>(&self, tag: &str, rng: &mut R) -> f64 {
        match tag.parse::<Activity>() {
            Ok(activity) => self.sample(activity, rng),
            Err(_) => UNKNOWN_ACTIVITY_SPEED,
        }
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        for activity in Activity::ALL {
            self.bounds(activity).validate(activity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_speed_within_bounds() {
        let model = SpeedModel::default();
        let mut rng = StdRng::seed_from_u64(42);

        for activity in Activity::ALL {
            let bounds = model.bounds(activity);
            for _ in 0..1000 {
                let speed = model.sample(activity, &mut rng);
                assert!(
                    bounds.contains(speed),
                    "{activity} speed {speed} outside [{}, {}]",
                    bounds.min,
                    bounds.max
                );
            }
        }
    }

    #[test]
    fn test_documented_bounds() {
        let model = SpeedModel::default();
        assert_eq!(model.bounds(Activity::Walking), SpeedBounds::new(1.0, 5.0));
        assert_eq!(model.bounds(Activity::Cycling), SpeedBounds::new(8.0, 25.0));
        assert_eq!(model.bounds(Activity::Driving), SpeedBounds::new(30.0, 120.0));
        assert_eq!(
            model.bounds(Activity::PublicTransport),
            SpeedBounds::new(20.0, 80.0)
        );
    }

    #[test]
    fn test_speed_has_two_decimals() {
        let model = SpeedModel::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let speed = model.sample(Activity::Driving, &mut rng);
            assert_eq!(round2(speed), speed);
        }
    }

    #[test]
    fn test_unknown_tag_is_constant() {
        let model = SpeedModel::default();
        let mut rng = StdRng::seed_from_u64(42);

        assert_eq!(model.sample_tag("teleporting", &mut rng), 1.0);
        assert_eq!(model.sample_tag("", &mut rng), UNKNOWN_ACTIVITY_SPEED);
    }

    #[test]
    fn test_known_tag_uses_bounds() {
        let model = SpeedModel::default();
        let mut rng = StdRng::seed_from_u64(42);

        let speed = model.sample_tag("cycling", &mut rng);
        assert!(model.cycling.contains(speed));
    }

    #[test]
    fn test_activity_parse_round_trip() {
        for activity in Activity::ALL {
            assert_eq!(activity.as_str().parse::<Activity>().unwrap(), activity);
        }
        assert!(matches!(
            "flying".parse::<Activity>(),
            Err(GenerationError::UnknownActivity(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let model = SpeedModel {
            driving: SpeedBounds::new(120.0, 30.0),
            ..SpeedModel::default()
        };
        assert!(matches!(
            model.validate(),
            Err(GenerationError::InvalidRange { .. })
        ));
        assert!(SpeedModel::default().validate().is_ok());
    }
}
