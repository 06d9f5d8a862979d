//! Transport collaborator contract.
//!
//! The session only needs connect / publish / disconnect plus a way to ask
//! whether the link is up and to re-establish it. Broker clients implement
//! [`Transport`]; the session drives it through `&mut self`, so one handle is
//! never used by two ticks at once.

use std::time::Duration;

use crate::error::{ConfigurationError, TransportError};

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl QoS {
    pub fn from_level(level: u8) -> Result<Self, ConfigurationError> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(ConfigurationError::InvalidQos(other)),
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// What the transport could confirm about a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Handed to the client's outgoing queue.
    Queued,
    /// Acknowledged by the broker.
    Acknowledged,
}

/// Parameters of a broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub client_id: String,
    pub broker: String,
    pub port: u16,
    pub keepalive: Duration,
}

/// A publish/subscribe client owned by a single virtual client.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Open a connection to the broker.
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), TransportError>;

    /// Publish one payload.
    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> Result<DeliveryResult, TransportError>;

    /// Whether the link to the broker is currently up.
    fn is_connected(&self) -> bool;

    /// Re-establish a lost connection using the options from `connect`.
    async fn reconnect(&mut self) -> Result<(), TransportError>;

    /// Close the connection and release client resources.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_levels() {
        for level in 0..=2 {
            assert_eq!(QoS::from_level(level).unwrap().level(), level);
        }
        assert!(matches!(
            QoS::from_level(3),
            Err(ConfigurationError::InvalidQos(3))
        ));
        assert_eq!(QoS::default(), QoS::AtLeastOnce);
    }
}
