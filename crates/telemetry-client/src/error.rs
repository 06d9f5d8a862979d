//! Error types for virtual client sessions.
//!
//! Three families with different consequences:
//!
//! - [`ConfigurationError`]: fatal at session start, the session never streams.
//! - [`TransportError`]: recoverable, the tick is skipped and the next tick
//!   reconnects.
//! - [`GenerationError`]: an invariant violation in trajectory synthesis,
//!   fatal and never retried.

use std::time::Duration;

use thiserror::Error;
use trajectory_generator::{GenerationError, ProfileError};

use crate::session::SessionState;

/// Invalid session parameters.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Topic template is empty")]
    EmptyTopicTemplate,

    #[error("Unknown placeholder '{{{0}}}' in topic template")]
    UnknownPlaceholder(String),

    #[error("Unbalanced braces in topic template '{0}'")]
    UnbalancedBraces(String),

    #[error("Topic template '{0}' must not contain MQTT wildcards")]
    WildcardInTopic(String),

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("session_hours {0} reaches outside the representable time range")]
    WindowOutOfRange(f64),

    #[error("Invalid QoS level {0}, expected 0, 1 or 2")]
    InvalidQos(u8),

    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("Failed to load trajectory profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("Invalid trajectory profile: {0}")]
    InvalidProfile(#[from] GenerationError),
}

/// Failures reported by a [`crate::Transport`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {broker}:{port}: {reason}")]
    Connect {
        broker: String,
        port: u16,
        reason: String,
    },

    #[error("Failed to publish to '{topic}': {reason}")]
    Publish { topic: String, reason: String },

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Reconnect failed: {0}")]
    Reconnect(String),

    #[error("Disconnect failed: {0}")]
    Disconnect(String),

    #[error("Timed out after {0:?} waiting for the broker")]
    Timeout(Duration),
}

/// Errors surfaced by the session lifecycle hooks.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to encode envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session has not been started")]
    NotStarted,

    #[error("Cannot {operation} a session that is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl SessionError {
    /// Whether this error ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Transport(_))
    }
}
