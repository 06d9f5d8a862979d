//! Virtual telemetry clients for the fleet-sim load testing tool.
//!
//! A [`VirtualClient`] owns one identity, one trajectory stream and one
//! transport handle. An external scheduler drives it through three hooks:
//! [`VirtualClient::start`] once, [`VirtualClient::tick`] repeatedly, and
//! [`VirtualClient::stop`] once.
//!
//! # Architecture
//!
//! ```text
//!            start()                 connect ok
//!   Idle ─────────────► Connecting ─────────────► Streaming ◄──┐
//!                          ▲   │                     │   │     │ tick():
//!                          │   └──── reconnect ──────┘   └─────┘ publish envelope
//!                          └──────── disconnect detected ──┘
//!
//!   any state ── stop() / generation error ──► Stopped
//! ```
//!
//! Transport failures degrade to skipped ticks; generation errors are fatal.
//! The transport itself is abstracted behind the [`Transport`] trait so the
//! session logic is independent of the broker client in use.

pub mod args;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod session;
pub mod testing;
pub mod transport;

// Re-exports for convenience
pub use args::{parse_duration, SessionArgs};
pub use envelope::Envelope;
pub use error::{ConfigurationError, SessionError, TransportError};
pub use identity::{ClientIdentity, SessionWindow, TopicTemplate, DEFAULT_TOPIC_TEMPLATE};
pub use session::{
    SessionSettings, SessionState, SessionStats, SkipReason, TickOutcome, VirtualClient,
};
pub use transport::{ConnectOptions, DeliveryResult, QoS, Transport};
