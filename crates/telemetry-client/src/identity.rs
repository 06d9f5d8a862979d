//! Client identity, session window and topic naming.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Builder;

use crate::error::ConfigurationError;

/// Topic used when none is configured.
pub const DEFAULT_TOPIC_TEMPLATE: &str = "client/{client_id}/session/{session_id}/";

/// Who a virtual client claims to be. Fixed for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    pub session_id: u32,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>, session_id: u32) -> Self {
        Self {
            client_id: client_id.into(),
            session_id,
        }
    }

    /// Draw an identity shaped like `usr{1..=53}-{uuid-v4}` with a session id
    /// in `1000..=9999`.
    ///
    /// The UUID bytes come from `rng`, so a seeded RNG gives a reproducible
    /// identity.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let user = rng.gen_range(1..=53);
        let uuid = Builder::from_random_bytes(rng.gen()).into_uuid();
        Self {
            client_id: format!("usr{user}-{uuid}"),
            session_id: rng.gen_range(1000..=9999),
        }
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.client_id, self.session_id)
    }
}

/// Time span reported in every envelope of a session.
///
/// Computed once at start (`end = now`, `start = end - session_hours`) and
/// never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SessionWindow {
    /// Length of a window of `session_hours`, rounded to the millisecond.
    pub fn span(session_hours: f64) -> Result<Duration, ConfigurationError> {
        if !session_hours.is_finite() || session_hours <= 0.0 {
            return Err(ConfigurationError::NonPositive {
                name: "session_hours",
                value: session_hours,
            });
        }
        let millis = (session_hours * 3_600_000.0).round();
        if millis >= i64::MAX as f64 {
            return Err(ConfigurationError::WindowOutOfRange(session_hours));
        }
        Duration::try_milliseconds(millis as i64)
            .ok_or(ConfigurationError::WindowOutOfRange(session_hours))
    }

    /// Window of `session_hours` ending at `end`.
    pub fn ending_at(end: DateTime<Utc>, session_hours: f64) -> Result<Self, ConfigurationError> {
        let span = Self::span(session_hours)?;
        let start = end
            .checked_sub_signed(span)
            .ok_or(ConfigurationError::WindowOutOfRange(session_hours))?;
        Ok(Self { start, end })
    }

    /// Window of `session_hours` ending now.
    pub fn ending_now(session_hours: f64) -> Result<Self, ConfigurationError> {
        Self::ending_at(Utc::now(), session_hours)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    ClientId,
    SessionId,
}

/// Parsed topic template with `{client_id}` and `{session_id}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl TopicTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigurationError> {
        if template.is_empty() {
            return Err(ConfigurationError::EmptyTopicTemplate);
        }
        if template.contains(|c| c == '+' || c == '#') {
            return Err(ConfigurationError::WildcardInTopic(template.to_string()));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => break,
                            _ => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(ConfigurationError::UnbalancedBraces(template.to_string()));
                    }

                    let segment = match name.as_str() {
                        "client_id" => Segment::ClientId,
                        "session_id" => Segment::SessionId,
                        _ => return Err(ConfigurationError::UnknownPlaceholder(name)),
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => {
                    return Err(ConfigurationError::UnbalancedBraces(template.to_string()));
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Substitute the identity into the template.
    pub fn render(&self, identity: &ClientIdentity) -> String {
        let mut topic = String::with_capacity(self.source.len() + identity.client_id.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => topic.push_str(text),
                Segment::ClientId => topic.push_str(&identity.client_id),
                Segment::SessionId => topic.push_str(&identity.session_id.to_string()),
            }
        }
        topic
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for TopicTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_TOPIC_TEMPLATE.to_string(),
            segments: vec![
                Segment::Literal("client/".to_string()),
                Segment::ClientId,
                Segment::Literal("/session/".to_string()),
                Segment::SessionId,
                Segment::Literal("/".to_string()),
            ],
        }
    }
}

impl FromStr for TopicTemplate {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
