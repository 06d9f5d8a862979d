//! CLI argument definitions for virtual client sessions.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use trajectory_generator::{StreamMode, TrajectoryProfile};

use crate::error::ConfigurationError;
use crate::identity::DEFAULT_TOPIC_TEMPLATE;
use crate::session::SessionSettings;
use crate::transport::QoS;

/// Per-session arguments shared by every command that builds clients.
#[derive(Args, Clone, Debug)]
pub struct SessionArgs {
    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    pub mqtt_broker: String,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT", default_value = "1883")]
    pub mqtt_port: u16,

    /// Topic template with {client_id} and {session_id} placeholders
    #[arg(long, env = "MQTT_TOPIC_TEMPLATE", default_value = DEFAULT_TOPIC_TEMPLATE)]
    pub topic_template: String,

    /// Length of the reported session window in hours
    #[arg(long, env = "SESSION_HOURS", default_value = "26")]
    pub session_hours: f64,

    /// Minutes between consecutive points in continuous mode (batch mode uses the profile's batch interval)
    #[arg(long, env = "POINT_INTERVAL_MIN", default_value = "2")]
    pub point_interval_min: u32,

    /// Trajectory mode: continuous (one point per tick) or batch (full day per tick)
    #[arg(long, default_value = "continuous")]
    pub mode: StreamMode,

    /// MQTT QoS level for publishes (0, 1 or 2)
    #[arg(long, default_value = "1")]
    pub qos: u8,

    /// MQTT keepalive in seconds
    #[arg(long, default_value = "300")]
    pub keepalive_secs: u64,

    /// Reconnect attempts per tick before the tick is skipped
    #[arg(long, default_value = "1")]
    pub reconnect_attempts: u32,

    /// Pause between reconnect attempts (e.g. "2s", "500ms")
    #[arg(long, default_value = "2s", value_parser = parse_duration)]
    pub reconnect_backoff: Duration,

    /// Offset mixed into each client's POI seed
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub seed_offset: i64,

    /// Base seed for motion randomness (random when omitted)
    #[arg(long)]
    pub motion_seed: Option<u64>,

    /// Path to a trajectory profile YAML file
    #[arg(long)]
    pub profile: Option<PathBuf>,
}

impl SessionArgs {
    /// Validate the arguments and turn them into session settings.
    pub fn to_settings(&self) -> Result<SessionSettings, ConfigurationError> {
        let profile = match &self.profile {
            Some(path) => TrajectoryProfile::from_file(path)?,
            None => TrajectoryProfile::default(),
        };
        if self.keepalive_secs == 0 {
            return Err(ConfigurationError::NonPositive {
                name: "keepalive_secs",
                value: 0.0,
            });
        }

        let settings = SessionSettings {
            broker: self.mqtt_broker.clone(),
            port: self.mqtt_port,
            keepalive: Duration::from_secs(self.keepalive_secs),
            topic_template: self.topic_template.clone(),
            qos: QoS::from_level(self.qos)?,
            session_hours: self.session_hours,
            interval_minutes: self.point_interval_min,
            mode: self.mode,
            seed_offset: self.seed_offset,
            reconnect_attempts: self.reconnect_attempts,
            reconnect_backoff: self.reconnect_backoff,
            profile,
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Parse a duration string like "1h", "30m", "300s", "500ms" or "1.5".
///
/// Plain numbers are seconds and may be fractional.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigurationError> {
    let s = s.trim();
    let invalid = || ConfigurationError::InvalidDuration(s.to_string());
    if s.is_empty() {
        return Err(invalid());
    }

    let (number, unit_secs) = if let Some(num_str) = s.strip_suffix("ms") {
        (num_str, 0.001)
    } else if let Some(num_str) = s.strip_suffix('h') {
        (num_str, 3600.0)
    } else if let Some(num_str) = s.strip_suffix('m') {
        (num_str, 60.0)
    } else if let Some(num_str) = s.strip_suffix('s') {
        (num_str, 1.0)
    } else {
        (s, 1.0)
    };

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(value * unit_secs).map_err(|_| invalid())
}
