//! Error types for trajectory generation.

use thiserror::Error;

/// Invariant violations in POI or leg generation.
///
/// These are programming-level faults: a session that hits one is
/// terminated rather than retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Expected {expected} points of interest, got {actual}")]
    PoiCount { expected: usize, actual: usize },

    #[error("Leg duration must be positive")]
    NonPositiveDuration,

    #[error("Sampling interval must be positive")]
    NonPositiveInterval,

    #[error("Dwell set is empty")]
    EmptyDwellSet,

    #[error("Batch schedule must have {expected} entries, got {actual}")]
    ScheduleLength { expected: usize, actual: usize },

    #[error("Invalid {name} range: [{min}, {max}]")]
    InvalidRange { name: String, min: f64, max: f64 },

    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Unknown stream mode: {0}")]
    UnknownMode(String),
}

/// Errors raised while loading a trajectory profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Error reading the profile file
    #[error("Failed to read profile file: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse profile YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Profile parsed but violates a generation invariant
    #[error("Invalid profile: {0}")]
    Invalid(#[from] GenerationError),
}
