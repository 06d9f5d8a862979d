//! Deterministic points of interest.
//!
//! Each client owns exactly four waypoints (home, work, gym, errands) that
//! are derived from its identity. The derivation uses its own ChaCha8 RNG,
//! seeded from a SHA-256 digest of `"{client_id}_{seed_offset}"`, so the
//! output is stable across calls, processes and platforms, and is never
//! disturbed by the randomness used for movement.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::GenerationError;

/// Number of points of interest per client.
pub const POI_COUNT: usize = 4;

/// Offsets (lat, lon) of each POI from the client's base coordinate.
const POI_OFFSETS: [(f64, f64); POI_COUNT] = [
    (0.0, 0.0),    // home
    (0.01, 0.02),  // work
    (0.02, -0.01), // gym
    (-0.01, 0.03), // errands
];

/// A fixed waypoint on a client's route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub lat: f64,
    pub lon: f64,
}

impl PointOfInterest {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Role of a POI in the daily cycle, in route order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoiKind {
    Home,
    Work,
    Gym,
    Errands,
}

impl PoiKind {
    pub const ALL: [PoiKind; POI_COUNT] =
        [PoiKind::Home, PoiKind::Work, PoiKind::Gym, PoiKind::Errands];

    pub fn index(&self) -> usize {
        match self {
            PoiKind::Home => 0,
            PoiKind::Work => 1,
            PoiKind::Gym => 2,
            PoiKind::Errands => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PoiKind::Home => "home",
            PoiKind::Work => "work",
            PoiKind::Gym => "gym",
            PoiKind::Errands => "errands",
        }
    }
}

/// Exactly four points of interest in route order.
///
/// Legs always connect `i` to `(i + 1) % 4`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoiSet([PointOfInterest; POI_COUNT]);

impl PoiSet {
    /// POI at a route position; wraps around the cycle.
    pub fn get(&self, index: usize) -> PointOfInterest {
        self.0[index % POI_COUNT]
    }

    pub fn kind(&self, kind: PoiKind) -> PointOfInterest {
        self.0[kind.index()]
    }

    pub fn as_slice(&self) -> &[PointOfInterest] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointOfInterest> {
        self.0.iter()
    }
}

impl TryFrom<Vec<PointOfInterest>> for PoiSet {
    type Error = GenerationError;

    fn try_from(points: Vec<PointOfInterest>) -> Result<Self, Self::Error> {
        let actual = points.len();
        <[PointOfInterest; POI_COUNT]>::try_from(points)
            .map(PoiSet)
            .map_err(|_| GenerationError::PoiCount {
                expected: POI_COUNT,
                actual,
            })
    }
}

/// Where client bases are scattered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiProfile {
    /// Latitude of the fixed reference point.
    pub reference_lat: f64,
    /// Longitude of the fixed reference point.
    pub reference_lon: f64,
    /// Maximum absolute deviation (degrees) of a client base from the reference.
    pub jitter: f64,
}

impl Default for PoiProfile {
    fn default() -> Self {
        Self {
            reference_lat: 59.3,
            reference_lon: 18.0,
            jitter: 0.05,
        }
    }
}

impl PoiProfile {
    /// Largest jitter accepted, in degrees.
    pub const MAX_JITTER: f64 = 1.0;

    pub fn validate(&self) -> Result<(), GenerationError> {
        if !(self.reference_lat.is_finite() && (-90.0..=90.0).contains(&self.reference_lat)) {
            return Err(GenerationError::InvalidRange {
                name: "poi reference_lat".to_string(),
                min: self.reference_lat,
                max: self.reference_lat,
            });
        }
        if !(self.reference_lon.is_finite() && (-180.0..=180.0).contains(&self.reference_lon)) {
            return Err(GenerationError::InvalidRange {
                name: "poi reference_lon".to_string(),
                min: self.reference_lon,
                max: self.reference_lon,
            });
        }
        if !(self.jitter.is_finite() && (0.0..=Self::MAX_JITTER).contains(&self.jitter)) {
            return Err(GenerationError::InvalidRange {
                name: "poi jitter".to_string(),
                min: -self.jitter,
                max: self.jitter,
            });
        }
        Ok(())
    }
}

/// Derive the POI seed for a client.
///
/// The first 8 bytes of `SHA-256("{client_id}_{seed_offset}")`, big-endian.
pub fn poi_seed(client_id: &str, seed_offset: i64) -> u64 {
    let digest = Sha256::digest(format!("{client_id}_{seed_offset}").as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Generate the four fixed points of interest for a client.
pub fn generate_pois(
    client_id: &str,
    seed_offset: i64,
    profile: &PoiProfile,
) -> Result<PoiSet, GenerationError> {
    profile.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(poi_seed(client_id, seed_offset));
    let base_lat = profile.reference_lat + jitter(&mut rng, profile.jitter);
    let base_lon = profile.reference_lon + jitter(&mut rng, profile.jitter);

    Ok(PoiSet(POI_OFFSETS.map(|(d_lat, d_lon)| {
        PointOfInterest::new(base_lat + d_lat, base_lon + d_lon)
    })))
}

fn jitter<R: Rng>(rng: &mut R, amplitude: f64) -> f64 {
    if amplitude == 0.0 {
        0.0
    } else {
        rng.gen_range(-amplitude..=amplitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_deterministic_generation() {
        let profile = PoiProfile::default();

        let first = generate_pois("usr7-abc", 0, &profile).unwrap();
        for _ in 0..10 {
            let again = generate_pois("usr7-abc", 0, &profile).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_seed_is_stable() {
        // The seed depends on nothing but the identity string.
        assert_eq!(poi_seed("usr7-abc", 0), poi_seed("usr7-abc", 0));
        assert_ne!(poi_seed("usr7-abc", 0), poi_seed("usr7-abc", 1));
        assert_ne!(poi_seed("usr7-abc", 0), poi_seed("usr8-abc", 0));
    }

    #[test]
    fn test_offsets_from_base() {
        let pois = generate_pois("usr7-abc", 0, &PoiProfile::default()).unwrap();
        let home = pois.kind(PoiKind::Home);

        for (kind, (d_lat, d_lon)) in PoiKind::ALL.iter().zip(POI_OFFSETS) {
            let poi = pois.kind(*kind);
            assert!((poi.lat - (home.lat + d_lat)).abs() < EPSILON, "{}", kind.as_str());
            assert!((poi.lon - (home.lon + d_lon)).abs() < EPSILON, "{}", kind.as_str());
        }
    }

    #[test]
    fn test_base_near_reference() {
        let profile = PoiProfile::default();

        for i in 0..200 {
            let pois = generate_pois(&format!("usr{i}-client"), 0, &profile).unwrap();
            let home = pois.kind(PoiKind::Home);
            assert!((home.lat - 59.3).abs() <= 0.05 + EPSILON);
            assert!((home.lon - 18.0).abs() <= 0.05 + EPSILON);
        }
    }

    #[test]
    fn test_usr7_abc_pois_are_pinned() {
        assert_eq!(poi_seed("usr7-abc", 0), 0x8fa9_6918_f396_1325);

        let pois = generate_pois("usr7-abc", 0, &PoiProfile::default()).unwrap();
        let expected = [
            (59.3443957767354, 17.973632339303236),
            (59.354395776735394, 17.993632339303236),
            (59.3643957767354, 17.963632339303235),
            (59.3343957767354, 18.003632339303238),
        ];
        for (poi, (lat, lon)) in pois.iter().zip(expected) {
            assert!((poi.lat - lat).abs() < 1e-12, "lat {} != {lat}", poi.lat);
            assert!((poi.lon - lon).abs() < 1e-12, "lon {} != {lon}", poi.lon);
        }
    }

    #[test]
    fn test_profile_rejects_out_of_range_values() {
        let huge_jitter = PoiProfile {
            jitter: 1.0e308,
            ..PoiProfile::default()
        };
        assert!(huge_jitter.validate().is_err());
        assert!(generate_pois("usr7-abc", 0, &huge_jitter).is_err());

        let negative_jitter = PoiProfile {
            jitter: -0.1,
            ..PoiProfile::default()
        };
        assert!(negative_jitter.validate().is_err());

        let bad_lat = PoiProfile {
            reference_lat: 95.0,
            ..PoiProfile::default()
        };
        assert!(bad_lat.validate().is_err());

        let bad_lon = PoiProfile {
            reference_lon: f64::NAN,
            ..PoiProfile::default()
        };
        assert!(bad_lon.validate().is_err());
    }

    #[test]
    fn test_seed_offset_changes_pois() {
        let profile = PoiProfile::default();
        let a = generate_pois("usr7-abc", 0, &profile).unwrap();
        let b = generate_pois("usr7-abc", 1, &profile).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_jitter_pins_base() {
        let profile = PoiProfile {
            jitter: 0.0,
            ..PoiProfile::default()
        };
        let pois = generate_pois("anyone", 3, &profile).unwrap();
        assert_eq!(pois.kind(PoiKind::Home), PointOfInterest::new(59.3, 18.0));
    }

    #[test]
    fn test_poi_set_requires_four() {
        let three = vec![PointOfInterest::new(0.0, 0.0); 3];
        assert_eq!(
            PoiSet::try_from(three),
            Err(GenerationError::PoiCount {
                expected: 4,
                actual: 3
            })
        );

        let four = vec![PointOfInterest::new(0.0, 0.0); 4];
        assert!(PoiSet::try_from(four).is_ok());
    }

    #[test]
    fn test_get_wraps_around() {
        let pois = generate_pois("usr7-abc", 0, &PoiProfile::default()).unwrap();
        assert_eq!(pois.get(4), pois.get(0));
        assert_eq!(pois.get(7), pois.kind(PoiKind::Errands));
    }

    #[test]
    fn test_negative_jitter_rejected() {
        let profile = PoiProfile {
            jitter: -0.1,
            ..PoiProfile::default()
        };
        assert!(generate_pois("usr7-abc", 0, &profile).is_err());
    }
}
