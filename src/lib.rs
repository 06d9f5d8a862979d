//! fleet-sim library
//!
//! A load generator that simulates a fleet of IoT devices publishing GPS
//! trajectories over MQTT.
//!
//! # Crates
//!
//! - `trajectory_generator` - POIs, speed model, leg interpolation and the
//!   continuous / batch trajectory streams
//! - `telemetry_client` - the virtual client session state machine, envelope
//!   encoding and the `Transport` trait
//! - `telemetry_client_mqtt` - the `rumqttc` transport
//!
//! This crate adds the harness that runs many clients concurrently and the
//! offline inspection commands.
//!
//! # CLI Usage
//!
//! ```bash
//! # 50 clients, 5 new clients per second, for 30 minutes
//! fleet-sim run --clients 50 --spawn-rate 5 --run-time 30m --mqtt-broker localhost
//!
//! # Dump a batch trajectory for one client
//! fleet-sim generate --client-id usr7-abc --mode batch --point-interval-min 15 --pretty
//!
//! # Show a client's points of interest
//! fleet-sim pois --client-id usr7-abc
//! ```

pub mod generate;
pub mod harness;

pub use generate::{GenerateArgs, PoisArgs, ProfileArgs};
pub use harness::{FleetArgs, FleetMetrics};
