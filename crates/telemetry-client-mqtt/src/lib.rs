//! MQTT transport for fleet-sim virtual clients.
//!
//! [`MqttTransport`] implements [`telemetry_client::Transport`] on top of
//! `rumqttc`. Each transport owns one broker connection whose event loop runs
//! in a background task; the task tracks the connection state so that
//! [`telemetry_client::Transport::is_connected`] is a cheap flag read.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use telemetry_client::{ConnectOptions, QoS, Transport};
//! use telemetry_client_mqtt::{MqttConfig, MqttTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), telemetry_client::TransportError> {
//!     let mut transport = MqttTransport::new(MqttConfig::default());
//!     transport
//!         .connect(&ConnectOptions {
//!             client_id: "usr1-demo".to_string(),
//!             broker: "localhost".to_string(),
//!             port: 1883,
//!             keepalive: std::time::Duration::from_secs(300),
//!         })
//!         .await?;
//!     transport
//!         .publish("client/usr1-demo/session/1000/", b"{}".to_vec(), QoS::AtLeastOnce)
//!         .await?;
//!     transport.disconnect().await
//! }
//! ```

mod transport;

pub use transport::{MqttConfig, MqttTransport};
