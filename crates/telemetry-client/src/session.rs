//! Virtual client session state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};
use trajectory_generator::{
    generate_pois, ContinuousStream, StreamMode, TrajectoryProfile, TrajectoryStream,
};

use crate::envelope::Envelope;
use crate::error::{ConfigurationError, SessionError};
use crate::identity::{ClientIdentity, SessionWindow, TopicTemplate, DEFAULT_TOPIC_TEMPLATE};
use crate::transport::{ConnectOptions, DeliveryResult, QoS, Transport};

/// Everything a session needs to know before it starts.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub broker: String,
    pub port: u16,
    pub keepalive: Duration,
    pub topic_template: String,
    pub qos: QoS,
    /// Length of the reported session window.
    pub session_hours: f64,
    /// Minutes between consecutive trajectory points.
    pub interval_minutes: u32,
    pub mode: StreamMode,
    /// Offset mixed into the POI seed.
    pub seed_offset: i64,
    /// Reconnect attempts per tick before the tick is skipped.
    pub reconnect_attempts: u32,
    /// Pause between reconnect attempts within one tick.
    pub reconnect_backoff: Duration,
    pub profile: TrajectoryProfile,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            broker: "localhost".to_string(),
            port: 1883,
            keepalive: Duration::from_secs(300),
            topic_template: DEFAULT_TOPIC_TEMPLATE.to_string(),
            qos: QoS::AtLeastOnce,
            session_hours: 26.0,
            interval_minutes: 2,
            mode: StreamMode::Continuous,
            seed_offset: 0,
            reconnect_attempts: 1,
            reconnect_backoff: Duration::from_secs(2),
            profile: TrajectoryProfile::default(),
        }
    }
}

impl SessionSettings {
    /// Check every parameter and parse the topic template.
    pub fn validate(&self) -> Result<TopicTemplate, ConfigurationError> {
        let template = TopicTemplate::parse(&self.topic_template)?;
        SessionWindow::span(self.session_hours)?;
        if self.interval_minutes == 0 {
            return Err(ConfigurationError::NonPositive {
                name: "interval_minutes",
                value: 0.0,
            });
        }
        if self.port == 0 {
            return Err(ConfigurationError::NonPositive {
                name: "port",
                value: 0.0,
            });
        }
        self.profile.validate()?;
        Ok(template)
    }
}

/// Lifecycle state of a [`VirtualClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why a tick did not publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The transport was down and reconnecting failed.
    Disconnected,
    /// The publish call itself failed.
    PublishFailed,
}

/// Result of one [`VirtualClient::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Published {
        points: usize,
        delivery: DeliveryResult,
    },
    Skipped(SkipReason),
    Stopped,
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub published: u64,
    pub points_published: u64,
    pub skipped: u64,
    pub publish_failures: u64,
    pub reconnect_attempts: u64,
}

/// Where each tick's envelope comes from.
enum Feed {
    Continuous(ContinuousStream<StdRng>),
    /// Batch sessions republish identical bytes every tick.
    Batch { payload: Vec<u8>, points: usize },
}

impl Feed {
    fn mode(&self) -> StreamMode {
        match self {
            Feed::Continuous(_) => StreamMode::Continuous,
            Feed::Batch { .. } => StreamMode::Batch,
        }
    }
}

/// State that exists between `start` and `stop`.
struct ActiveSession {
    identity: ClientIdentity,
    window: SessionWindow,
    topic: String,
    feed: Feed,
}

impl ActiveSession {
    /// Encode the payload for the next tick.
    fn next_payload(&mut self) -> Result<(Vec<u8>, usize), SessionError> {
        match &mut self.feed {
            Feed::Continuous(stream) => {
                let point = stream.next_point()?;
                let envelope = Envelope::continuous(&self.identity, &self.window, &point);
                Ok((envelope.to_json()?, 1))
            }
            Feed::Batch { payload, points } => Ok((payload.clone(), *points)),
        }
    }
}

/// One simulated IoT device.
///
/// Owns its identity, its trajectory cursor and its transport handle. All
/// hooks take `&mut self`, so ticks on one client are serialized by
/// construction. The transport is released on every path into
/// [`SessionState::Stopped`], and dropped with the client otherwise.
pub struct VirtualClient<T: Transport> {
    settings: Arc<SessionSettings>,
    state: SessionState,
    transport: Option<T>,
    session: Option<ActiveSession>,
    identity: Option<ClientIdentity>,
    motion_seed: Option<u64>,
    stats: SessionStats,
}

impl<T: Transport> VirtualClient<T> {
    pub fn new(settings: Arc<SessionSettings>, transport: T) -> Self {
        Self {
            settings,
            state: SessionState::Idle,
            transport: Some(transport),
            session: None,
            identity: None,
            motion_seed: None,
            stats: SessionStats::default(),
        }
    }

    /// Use a fixed identity instead of drawing one at start.
    pub fn with_identity(mut self, identity: ClientIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Seed the motion RNG (activity, speed, elevation, commute, dwell).
    ///
    /// Without a seed the RNG is initialised from OS entropy.
    pub fn with_motion_seed(mut self, seed: u64) -> Self {
        self.motion_seed = Some(seed);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Identity in use, once started.
    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.session
            .as_ref()
            .map(|session| &session.identity)
            .or(self.identity.as_ref())
    }

    pub fn window(&self) -> Option<SessionWindow> {
        self.session.as_ref().map(|session| session.window)
    }

    pub fn topic(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.topic.as_str())
    }

    /// Whether the session still holds its transport handle.
    pub fn holds_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Start hook: `Idle → Connecting → Streaming`.
    ///
    /// Configuration and generation errors stop the session and are returned.
    /// A failed connect is logged and leaves the session `Connecting`; the
    /// next tick retries.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        let session = match self.prepare() {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Session failed to initialise");
                self.stop().await;
                return Err(e);
            }
        };

        let options = ConnectOptions {
            client_id: session.identity.client_id.clone(),
            broker: self.settings.broker.clone(),
            port: self.settings.port,
            keepalive: self.settings.keepalive,
        };
        info!(
            client_id = %session.identity.client_id,
            session_id = session.identity.session_id,
            topic = %session.topic,
            mode = %session.feed.mode(),
            "Starting session"
        );
        self.session = Some(session);
        self.state = SessionState::Connecting;

        let Some(transport) = self.transport.as_mut() else {
            return Err(SessionError::NotStarted);
        };
        match transport.connect(&options).await {
            Ok(()) => {
                info!(
                    client_id = %options.client_id,
                    broker = %options.broker,
                    port = options.port,
                    "Connected to broker"
                );
                self.state = SessionState::Streaming;
            }
            Err(e) => {
                warn!(
                    client_id = %options.client_id,
                    error = %e,
                    "Initial connect failed, will retry on next tick"
                );
            }
        }
        Ok(())
    }

    /// Build identity, window, POIs and the trajectory stream.
    fn prepare(&mut self) -> Result<ActiveSession, SessionError> {
        let settings = &self.settings;
        let template = settings.validate()?;

        let mut rng = match self.motion_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let identity = match self.identity.take() {
            Some(identity) => identity,
            None => ClientIdentity::random(&mut rng),
        };
        let window = SessionWindow::ending_now(settings.session_hours)?;
        let topic = template.render(&identity);

        let pois = generate_pois(
            &identity.client_id,
            settings.seed_offset,
            &settings.profile.poi,
        )?;
        let stream = TrajectoryStream::build(
            settings.mode,
            pois,
            window.start,
            settings.interval_minutes,
            &settings.profile,
            rng,
        )?;
        let feed = match stream {
            TrajectoryStream::Continuous(stream) => Feed::Continuous(stream),
            TrajectoryStream::Batch(points) => {
                let payload = Envelope::batch(&identity, &window, &points).to_json()?;
                debug!(
                    client_id = %identity.client_id,
                    points = points.len(),
                    bytes = payload.len(),
                    "Precomputed batch trajectory"
                );
                Feed::Batch {
                    payload,
                    points: points.len(),
                }
            }
        };

        Ok(ActiveSession {
            identity,
            window,
            topic,
            feed,
        })
    }

    /// Tick hook: publish the next envelope.
    ///
    /// Transport problems skip the tick and return `Ok`; generation errors
    /// stop the session and return `Err`.
    pub async fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        match self.state {
            SessionState::Idle => return Err(SessionError::NotStarted),
            SessionState::Stopped => return Ok(TickOutcome::Stopped),
            SessionState::Connecting | SessionState::Streaming => {}
        }
        self.stats.ticks += 1;

        if !self.ensure_connected().await {
            self.stats.skipped += 1;
            return Ok(TickOutcome::Skipped(SkipReason::Disconnected));
        }

        let encoded = match self.session.as_mut() {
            Some(session) => session.next_payload(),
            None => return Err(SessionError::NotStarted),
        };
        let (payload, points) = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, "Trajectory generation failed, stopping session");
                self.stop().await;
                return Err(e);
            }
        };

        let (Some(session), Some(transport)) = (self.session.as_ref(), self.transport.as_mut())
        else {
            return Err(SessionError::NotStarted);
        };
        match transport
            .publish(&session.topic, payload, self.settings.qos)
            .await
        {
            Ok(delivery) => {
                self.stats.published += 1;
                self.stats.points_published += points as u64;
                debug!(
                    client_id = %session.identity.client_id,
                    topic = %session.topic,
                    points,
                    "Published envelope"
                );
                Ok(TickOutcome::Published { points, delivery })
            }
            Err(e) => {
                self.stats.publish_failures += 1;
                self.stats.skipped += 1;
                warn!(
                    client_id = %session.identity.client_id,
                    topic = %session.topic,
                    error = %e,
                    "Publish failed, skipping tick"
                );
                if !transport.is_connected() {
                    self.state = SessionState::Connecting;
                }
                Ok(TickOutcome::Skipped(SkipReason::PublishFailed))
            }
        }
    }

    /// Make sure the transport is up, reconnecting a bounded number of times.
    async fn ensure_connected(&mut self) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };
        if self.state == SessionState::Streaming {
            if transport.is_connected() {
                return true;
            }
            warn!("Transport disconnected");
            self.state = SessionState::Connecting;
        }

        let attempts = self.settings.reconnect_attempts.max(1);
        for attempt in 1..=attempts {
            self.stats.reconnect_attempts += 1;
            match transport.reconnect().await {
                Ok(()) if transport.is_connected() => {
                    info!(attempt, "Reconnected to broker");
                    self.state = SessionState::Streaming;
                    return true;
                }
                Ok(()) => warn!(attempt, "Reconnect returned but transport is still down"),
                Err(e) => warn!(attempt, error = %e, "Reconnect failed"),
            }
            if attempt < attempts && !self.settings.reconnect_backoff.is_zero() {
                tokio::time::sleep(self.settings.reconnect_backoff).await;
            }
        }
        false
    }

    /// Stop hook: move to `Stopped` and release the transport.
    ///
    /// `disconnect` is called once if a connection was ever attempted.
    /// Calling `stop` again is a no-op.
    pub async fn stop(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Stopped);

        if let Some(mut transport) = self.transport.take() {
            if matches!(
                previous,
                SessionState::Connecting | SessionState::Streaming
            ) {
                if let Err(e) = transport.disconnect().await {
                    warn!(error = %e, "Disconnect failed");
                }
            }
        }

        if previous != SessionState::Stopped {
            if let Some(identity) = self.identity() {
                info!(
                    client = %identity,
                    published = self.stats.published,
                    skipped = self.stats.skipped,
                    "Session stopped"
                );
            }
        }
    }
}

impl<T: Transport> fmt::Debug for VirtualClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualClient")
            .field("state", &self.state)
            .field("identity", &self.identity())
            .field("holds_transport", &self.transport.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
