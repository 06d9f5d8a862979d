//! Scripted in-memory transport for tests and dry runs.
//!
//! [`MockTransport`] is a cheap `Clone` handle: give one clone to a
//! [`crate::VirtualClient`] and keep another to script failures and inspect
//! what was published.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::TransportError;
use crate::transport::{ConnectOptions, DeliveryResult, QoS, Transport};

/// Number of times each transport operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportCalls {
    pub connect: usize,
    pub publish: usize,
    pub reconnect: usize,
    pub disconnect: usize,
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    options: Option<ConnectOptions>,
    fail_connect: bool,
    failing_reconnects: usize,
    failing_publishes: usize,
    record_payloads: bool,
    published: Vec<(String, Vec<u8>)>,
    calls: TransportCalls,
}

/// In-memory [`Transport`] with scriptable failures.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                record_payloads: true,
                ..MockState::default()
            })),
        }
    }

    /// A transport that counts publishes but does not keep the payloads.
    pub fn counting() -> Self {
        let transport = Self::new();
        transport.lock().record_payloads = false;
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock only happens in a failing test.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make every `connect` call fail.
    pub fn fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Simulate the broker dropping the connection.
    pub fn drop_connection(&self) {
        self.lock().connected = false;
    }

    /// Fail the next `count` reconnect attempts.
    pub fn fail_next_reconnects(&self, count: usize) {
        self.lock().failing_reconnects = count;
    }

    /// Fail the next `count` publishes without dropping the connection.
    pub fn fail_next_publishes(&self, count: usize) {
        self.lock().failing_publishes = count;
    }

    pub fn calls(&self) -> TransportCalls {
        self.lock().calls
    }

    /// Topic and payload of every successful publish, in order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().published.clone()
    }

    pub fn last_connect_options(&self) -> Option<ConnectOptions> {
        self.lock().options.clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.connect += 1;
        state.options = Some(options.clone());
        if state.fail_connect {
            state.connected = false;
            return Err(TransportError::Connect {
                broker: options.broker.clone(),
                port: options.port,
                reason: "scripted connect failure".to_string(),
            });
        }
        state.connected = true;
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> Result<DeliveryResult, TransportError> {
        let mut state = self.lock();
        state.calls.publish += 1;
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.failing_publishes > 0 {
            state.failing_publishes -= 1;
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: "scripted publish failure".to_string(),
            });
        }
        if state.record_payloads {
            state.published.push((topic.to_string(), payload));
        }
        Ok(match qos {
            QoS::AtMostOnce => DeliveryResult::Queued,
            QoS::AtLeastOnce | QoS::ExactlyOnce => DeliveryResult::Acknowledged,
        })
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.reconnect += 1;
        if state.options.is_none() {
            return Err(TransportError::NotConnected);
        }
        if state.failing_reconnects > 0 {
            state.failing_reconnects -= 1;
            return Err(TransportError::Reconnect(
                "scripted reconnect failure".to_string(),
            ));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.disconnect += 1;
        state.connected = false;
        Ok(())
    }
}
