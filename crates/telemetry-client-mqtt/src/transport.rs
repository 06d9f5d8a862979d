use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet,
};
use telemetry_client::{ConnectOptions, DeliveryResult, QoS, Transport, TransportError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tuning for [`MqttTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    /// How long `connect` and `reconnect` wait for the broker's CONNACK.
    pub connect_timeout: Duration,
    /// How long `publish` waits for room in the request channel. The channel
    /// stops draining once the broker stops acknowledging in-flight messages.
    pub publish_timeout: Duration,
    /// Capacity of the request channel between client and event loop.
    pub channel_capacity: usize,
    /// Pause before the event loop retries after a connection error.
    pub retry_delay: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(5),
            channel_capacity: 10,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Live broker connection and its event loop task.
struct Connection {
    client: AsyncClient,
    status: watch::Receiver<bool>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Connection {
    fn open(options: &ConnectOptions, config: &MqttConfig) -> Result<Self, TransportError> {
        if options.client_id.is_empty() || options.client_id.starts_with(' ') {
            return Err(TransportError::Connect {
                broker: options.broker.clone(),
                port: options.port,
                reason: format!("invalid MQTT client id '{}'", options.client_id),
            });
        }
        let mut mqtt_options =
            MqttOptions::new(options.client_id.clone(), options.broker.clone(), options.port);
        mqtt_options.set_keep_alive(options.keepalive);
        mqtt_options.set_clean_session(false);

        let (client, eventloop) = AsyncClient::new(mqtt_options, config.channel_capacity);
        let (status_tx, status) = watch::channel(false);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(drive_event_loop(
            eventloop,
            status_tx,
            shutdown.clone(),
            config.retry_delay,
            options.client_id.clone(),
        ));

        Ok(Self {
            client,
            status,
            shutdown,
            task,
        })
    }

    fn is_up(&self) -> bool {
        *self.status.borrow()
    }

    /// Wait until the event loop reports an accepted connection.
    async fn wait_connected(&mut self, timeout: Duration) -> Result<(), TransportError> {
        match tokio::time::timeout(timeout, self.status.wait_for(|up| *up)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(TransportError::NotConnected),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    async fn close(self, timeout: Duration) -> Result<(), TransportError> {
        let result = if self.is_up() {
            self.client
                .try_disconnect()
                .map_err(|e| TransportError::Disconnect(e.to_string()))
        } else {
            Ok(())
        };
        if result.is_ok() && self.is_up() {
            let mut status = self.status.clone();
            let _ = tokio::time::timeout(timeout, status.wait_for(|up| !*up)).await;
        }
        self.shutdown.cancel();
        if tokio::time::timeout(timeout, self.task).await.is_err() {
            warn!("MQTT event loop did not stop in time");
        }
        result
    }
}

/// Poll the event loop until shutdown, publishing connection state changes.
async fn drive_event_loop(
    mut eventloop: EventLoop,
    status: watch::Sender<bool>,
    shutdown: CancellationToken,
    retry_delay: Duration,
    client_id: String,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        debug!(client_id = %client_id, session_present = ack.session_present, "Broker accepted connection");
                        status.send_replace(true);
                    } else {
                        warn!(client_id = %client_id, code = ?ack.code, "Broker refused connection");
                        status.send_replace(false);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!(client_id = %client_id, "Broker closed the connection");
                    status.send_replace(false);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    status.send_replace(false);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    if status.send_replace(false) {
                        warn!(client_id = %client_id, error = %e, "MQTT connection lost");
                    } else {
                        debug!(client_id = %client_id, error = %e, "MQTT connection attempt failed");
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(retry_delay) => {}
                    }
                }
            },
        }
    }
    status.send_replace(false);
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// [`Transport`] backed by a `rumqttc` client.
///
/// Connections use a persistent session (clean session off) with the
/// virtual client's id as MQTT client id. Publishes are queued to the event
/// loop, so a successful publish reports [`DeliveryResult::Queued`].
pub struct MqttTransport {
    config: MqttConfig,
    options: Option<ConnectOptions>,
    connection: Option<Connection>,
}

impl MqttTransport {
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            options: None,
            connection: None,
        }
    }

    async fn close_connection(&mut self) -> Result<(), TransportError> {
        match self.connection.take() {
            Some(connection) => connection.close(self.config.connect_timeout).await,
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), TransportError> {
        if let Err(e) = self.close_connection().await {
            debug!(error = %e, "Ignoring error while replacing MQTT connection");
        }
        self.options = Some(options.clone());

        let mut connection = Connection::open(options, &self.config)?;
        let result = connection
            .wait_connected(self.config.connect_timeout)
            .await
            .map_err(|e| TransportError::Connect {
                broker: options.broker.clone(),
                port: options.port,
                reason: e.to_string(),
            });
        // The event loop keeps retrying in the background; reconnect waits on it.
        self.connection = Some(connection);
        if result.is_ok() {
            info!(
                client_id = %options.client_id,
                broker = %options.broker,
                port = options.port,
                "MQTT connected"
            );
        }
        result
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> Result<DeliveryResult, TransportError> {
        let connection = match self.connection.as_ref() {
            Some(connection) if connection.is_up() => connection,
            _ => return Err(TransportError::NotConnected),
        };
        let timeout = self.config.publish_timeout;
        let queued = connection
            .client
            .publish(topic, to_mqtt_qos(qos), false, payload);
        match tokio::time::timeout(timeout, queued).await {
            Ok(Ok(())) => Ok(DeliveryResult::Queued),
            Ok(Err(e)) => Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                warn!(topic, timeout = ?timeout, "MQTT publish timed out, request channel is full");
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_up)
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        let Some(options) = self.options.clone() else {
            return Err(TransportError::NotConnected);
        };
        let timeout = self.config.connect_timeout;

        let loop_alive = self
            .connection
            .as_ref()
            .is_some_and(|connection| !connection.task.is_finished());
        if !loop_alive {
            if let Err(e) = self.close_connection().await {
                debug!(error = %e, "Ignoring error while closing stale MQTT connection");
            }
            self.connection = Some(Connection::open(&options, &self.config)?);
        }

        let Some(connection) = self.connection.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        connection
            .wait_connected(timeout)
            .await
            .map_err(|e| TransportError::Reconnect(e.to_string()))?;
        info!(client_id = %options.client_id, "MQTT reconnected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let result = self.close_connection().await;
        if let Some(options) = self.options.take() {
            debug!(client_id = %options.client_id, "MQTT disconnected");
        }
        result
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.shutdown.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Broker that accepts one connection and never acknowledges a publish.
    async fn silent_broker() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            // CONNECT
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            while let Ok(n) = socket.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
        });
        port
    }

    fn unreachable_options() -> ConnectOptions {
        ConnectOptions {
            client_id: "usr1-test".to_string(),
            broker: "127.0.0.1".to_string(),
            // Nothing listens on port 1.
            port: 1,
            keepalive: Duration::from_secs(300),
        }
    }

    fn fast_config() -> MqttConfig {
        MqttConfig {
            connect_timeout: Duration::from_millis(200),
            publish_timeout: Duration::from_millis(200),
            channel_capacity: 10,
            retry_delay: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(to_mqtt_qos(QoS::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(to_mqtt_qos(QoS::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(to_mqtt_qos(QoS::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_operations_before_connect() {
        let mut transport = MqttTransport::new(fast_config());
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.publish("t", vec![1], QoS::AtLeastOnce).await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.reconnect().await,
            Err(TransportError::NotConnected)
        ));
        assert!(transport.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_without_panicking() {
        let mut transport = MqttTransport::new(fast_config());

        let err = transport.connect(&unreachable_options()).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { port: 1, .. }));
        assert!(!transport.is_connected());

        assert!(matches!(
            transport.reconnect().await,
            Err(TransportError::Reconnect(_))
        ));
        assert!(matches!(
            transport.publish("t", vec![1], QoS::AtLeastOnce).await,
            Err(TransportError::NotConnected)
        ));
        assert!(transport.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_publish_bounded_when_broker_stops_acknowledging() {
        let port = silent_broker().await;
        let mut transport = MqttTransport::new(fast_config());
        let options = ConnectOptions {
            port,
            ..unreachable_options()
        };
        transport.connect(&options).await.unwrap();
        assert!(transport.is_connected());

        let outcome = tokio::time::timeout(Duration::from_secs(20), async {
            for _ in 0..1000 {
                match transport.publish("fleet/t", vec![0; 16], QoS::AtLeastOnce).await {
                    Ok(delivery) => assert_eq!(delivery, DeliveryResult::Queued),
                    Err(e) => return Some(e),
                }
            }
            None
        })
        .await
        .expect("publish loop should not hang");

        assert!(matches!(
            outcome,
            Some(TransportError::Timeout(timeout)) if timeout == Duration::from_millis(200)
        ));
        // The request channel is still full, so the DISCONNECT may not be queued.
        let _ = transport.disconnect().await;
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_empty_client_id_rejected() {
        let mut transport = MqttTransport::new(fast_config());
        let options = ConnectOptions {
            client_id: String::new(),
            ..unreachable_options()
        };
        assert!(matches!(
            transport.connect(&options).await,
            Err(TransportError::Connect { .. })
        ));
    }
}
