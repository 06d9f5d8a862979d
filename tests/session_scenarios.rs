//! End-to-end session scenarios against the scripted transport.

use std::sync::Arc;
use std::time::Duration;

use telemetry_client::testing::MockTransport;
use telemetry_client::{
    ClientIdentity, Envelope, SessionSettings, SessionState, SkipReason, TickOutcome,
    VirtualClient,
};
use trajectory_generator::{generate_pois, PoiProfile, StreamMode};

fn settings(mode: StreamMode) -> SessionSettings {
    SessionSettings {
        session_hours: 26.0,
        interval_minutes: 2,
        mode,
        reconnect_backoff: Duration::ZERO,
        ..SessionSettings::default()
    }
}

fn client(settings: SessionSettings, transport: &MockTransport) -> VirtualClient<MockTransport> {
    VirtualClient::new(Arc::new(settings), transport.clone())
        .with_identity(ClientIdentity::new("usr7-abc", 1234))
        .with_motion_seed(99)
}

#[tokio::test]
async fn test_stop_before_first_tick() {
    let transport = MockTransport::new();
    let mut client = client(settings(StreamMode::Continuous), &transport);

    client.start().await.unwrap();
    client.stop().await;

    assert_eq!(client.state(), SessionState::Stopped);
    let calls = transport.calls();
    assert_eq!(calls.disconnect, 1);
    assert_eq!(calls.publish, 0);
}

#[tokio::test]
async fn test_failure_on_tick_n_recovers_on_tick_n_plus_one() {
    let transport = MockTransport::new();
    let mut client = client(settings(StreamMode::Continuous), &transport);
    client.start().await.unwrap();

    for _ in 0..3 {
        assert!(matches!(
            client.tick().await.unwrap(),
            TickOutcome::Published { .. }
        ));
    }

    transport.drop_connection();
    transport.fail_next_reconnects(1);
    assert_eq!(
        client.tick().await.unwrap(),
        TickOutcome::Skipped(SkipReason::Disconnected)
    );
    assert_eq!(transport.calls().reconnect, 1);

    assert!(matches!(
        client.tick().await.unwrap(),
        TickOutcome::Published { points: 1, .. }
    ));
    assert_eq!(transport.published().len(), 4);

    client.stop().await;
    assert_eq!(transport.calls().disconnect, 1);
}

#[tokio::test]
async fn test_continuous_session_timestamps_advance() {
    let transport = MockTransport::new();
    let mut client = client(settings(StreamMode::Continuous), &transport);
    client.start().await.unwrap();

    for _ in 0..200 {
        client.tick().await.unwrap();
    }
    client.stop().await;

    let published = transport.published();
    assert_eq!(published.len(), 200);
    let points: Vec<_> = published
        .iter()
        .map(|(_, payload)| Envelope::from_json(payload).unwrap().trajectory[0].clone())
        .collect();
    assert!(points
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));

    let window = client.window().unwrap();
    assert_eq!(points[0].timestamp, window.start);
    assert_eq!(window.end - window.start, chrono::Duration::hours(26));
}

#[tokio::test]
async fn test_trajectory_starts_at_home_poi() {
    let transport = MockTransport::new();
    let mut client = client(settings(StreamMode::Batch), &transport);
    client.start().await.unwrap();
    client.tick().await.unwrap();

    let pois = generate_pois("usr7-abc", 0, &PoiProfile::default()).unwrap();
    let (_, payload) = &transport.published()[0];
    let envelope = Envelope::from_json(payload).unwrap();
    assert_eq!(envelope.trajectory[0].lat, pois.get(0).lat);
    assert_eq!(envelope.trajectory[0].lon, pois.get(0).lon);
}

#[tokio::test]
async fn test_clients_are_isolated() {
    let healthy = MockTransport::new();
    let broken = MockTransport::new();
    broken.fail_connect(true);
    broken.fail_next_reconnects(100);

    let mut good = client(settings(StreamMode::Continuous), &healthy);
    let mut bad = VirtualClient::new(Arc::new(settings(StreamMode::Continuous)), broken.clone())
        .with_identity(ClientIdentity::new("usr8-def", 4321));

    good.start().await.unwrap();
    bad.start().await.unwrap();
    for _ in 0..5 {
        assert!(matches!(
            good.tick().await.unwrap(),
            TickOutcome::Published { .. }
        ));
        assert_eq!(
            bad.tick().await.unwrap(),
            TickOutcome::Skipped(SkipReason::Disconnected)
        );
    }

    assert_eq!(healthy.published().len(), 5);
    assert!(broken.published().is_empty());
    assert_eq!(bad.state(), SessionState::Connecting);
}
