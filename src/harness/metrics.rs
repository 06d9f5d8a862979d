//! Aggregate metrics for a harness run.

use std::time::Duration;

use serde::Serialize;
use telemetry_client::SessionStats;

/// Final state of one client task.
#[derive(Debug, Clone)]
pub struct ClientReport {
    pub index: usize,
    pub client_id: Option<String>,
    pub stats: SessionStats,
    /// Error that ended the session early, if any.
    pub fatal: Option<String>,
}

/// Metrics summed over all clients of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetMetrics {
    pub clients_spawned: u64,
    pub sessions_fatal: u64,
    pub ticks: u64,
    pub messages_published: u64,
    pub points_published: u64,
    pub ticks_skipped: u64,
    pub publish_failures: u64,
    pub reconnect_attempts: u64,
    /// Wall-clock time of the run.
    pub total_duration: Duration,
}

impl FleetMetrics {
    pub fn record(&mut self, report: &ClientReport) {
        self.clients_spawned += 1;
        if report.fatal.is_some() {
            self.sessions_fatal += 1;
        }
        let stats = &report.stats;
        self.ticks += stats.ticks;
        self.messages_published += stats.published;
        self.points_published += stats.points_published;
        self.ticks_skipped += stats.skipped;
        self.publish_failures += stats.publish_failures;
        self.reconnect_attempts += stats.reconnect_attempts;
    }

    /// Calculate messages per second.
    pub fn messages_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.messages_published as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            clients = self.clients_spawned,
            fatal = self.sessions_fatal,
            published = self.messages_published,
            points = self.points_published,
            skipped = self.ticks_skipped,
            publish_failures = self.publish_failures,
            reconnects = self.reconnect_attempts,
            "Run finished in {:?} ({:.1} msg/s)",
            self.total_duration,
            self.messages_per_second()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(published: u64, fatal: bool) -> ClientReport {
        ClientReport {
            index: 0,
            client_id: Some("usr1-test".to_string()),
            stats: SessionStats {
                ticks: published + 1,
                published,
                points_published: published,
                skipped: 1,
                publish_failures: 0,
                reconnect_attempts: 1,
            },
            fatal: fatal.then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_record_sums_clients() {
        let mut metrics = FleetMetrics::default();
        metrics.record(&report(10, false));
        metrics.record(&report(5, true));

        assert_eq!(metrics.clients_spawned, 2);
        assert_eq!(metrics.sessions_fatal, 1);
        assert_eq!(metrics.messages_published, 15);
        assert_eq!(metrics.ticks, 17);
        assert_eq!(metrics.ticks_skipped, 2);
    }

    #[test]
    fn test_messages_per_second() {
        let mut metrics = FleetMetrics::default();
        assert_eq!(metrics.messages_per_second(), 0.0);

        metrics.messages_published = 30;
        metrics.total_duration = Duration::from_secs(10);
        assert!((metrics.messages_per_second() - 3.0).abs() < f64::EPSILON);
    }
}
