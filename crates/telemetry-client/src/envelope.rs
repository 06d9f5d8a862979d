//! Wire payload published on every tick.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trajectory_generator::TrajectoryPoint;

use crate::identity::{ClientIdentity, SessionWindow};

/// Session metadata plus one or more trajectory points.
///
/// Borrows its contents when built for publishing; owns them when parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<'a> {
    pub client_id: Cow<'a, str>,
    pub session_id: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub trajectory: Cow<'a, [TrajectoryPoint]>,
}

impl<'a> Envelope<'a> {
    pub fn new(
        identity: &'a ClientIdentity,
        window: &SessionWindow,
        trajectory: &'a [TrajectoryPoint],
    ) -> Self {
        Self {
            client_id: Cow::Borrowed(&identity.client_id),
            session_id: identity.session_id,
            start_time: window.start,
            end_time: window.end,
            trajectory: Cow::Borrowed(trajectory),
        }
    }

    /// Envelope carrying the single point published by a continuous tick.
    pub fn continuous(
        identity: &'a ClientIdentity,
        window: &SessionWindow,
        point: &'a TrajectoryPoint,
    ) -> Self {
        Self::new(identity, window, std::slice::from_ref(point))
    }

    /// Envelope carrying a whole precomputed trajectory.
    pub fn batch(
        identity: &'a ClientIdentity,
        window: &SessionWindow,
        trajectory: &'a [TrajectoryPoint],
    ) -> Self {
        Self::new(identity, window, trajectory)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Envelope<'static> {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
