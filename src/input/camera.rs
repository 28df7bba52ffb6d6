//! Camera snapshots
//!
//! A snapshot is requested on demand (button, Return key), whenever the
//! session becomes ready, and every refresh period after the last request.
//! Payloads stay opaque; the panel only shows what arrived and when.

use super::rate_limiter::RateLimiter;
use crate::protocol::{Command, SnapshotPayload};
use crate::timer::Timer;
use chrono::{DateTime, Local};
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// Last snapshot received from the device
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub payload: SnapshotPayload,
    pub received_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct Camera {
    limiter: RateLimiter,
    refresh: Timer,
    waiting: bool,
    latest: Option<Snapshot>,
}

impl Camera {
    pub fn new(interval: Duration, refresh_period: Duration) -> Self {
        Self {
            limiter: RateLimiter::new(interval),
            refresh: Timer::new(refresh_period),
            waiting: false,
            latest: None,
        }
    }

    /// Asks for a snapshot, at most once per interval. Every request that
    /// goes through restarts the refresh period.
    pub fn request(&mut self) -> Option<Command> {
        let refresh = &mut self.refresh;
        let waiting = &mut self.waiting;
        let command = self.limiter.call(|| {
            refresh.restart(Instant::now());
            *waiting = true;
            Command::Snapshot
        });
        if command.is_none() {
            debug!("Snapshot request throttled");
        }
        command
    }

    /// Fires the auto-refresh when it is due. Call once per frame.
    pub fn poll(&mut self) -> Option<Command> {
        if self.refresh.take_due(Instant::now()) {
            debug!("Camera auto-refresh due");
            return self.request();
        }
        None
    }

    pub fn next_refresh(&self) -> Option<Instant> {
        self.refresh.deadline()
    }

    pub fn got_snapshot(&mut self, payload: SnapshotPayload) {
        info!("Snapshot received ({} bytes)", payload.len());
        self.waiting = false;
        self.latest = Some(Snapshot {
            payload,
            received_at: Local::now(),
        });
    }

    /// A request went out and nothing has come back yet
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn disconnected(&mut self) {
        self.refresh.stop();
        self.limiter.reset();
        self.waiting = false;
        self.latest = None;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(super::DEFAULT_MEDIA_INTERVAL_MS),
            Duration::from_millis(super::DEFAULT_CAMERA_REFRESH_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn requests_are_throttled() {
        let mut camera = Camera::default();

        assert_eq!(camera.request(), Some(Command::Snapshot));
        assert!(camera.is_waiting());
        advance(Duration::from_millis(1000)).await;
        assert_eq!(camera.request(), None);
        advance(Duration::from_millis(1000)).await;
        assert_eq!(camera.request(), Some(Command::Snapshot));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_follows_last_request() {
        let mut camera = Camera::default();

        assert!(camera.poll().is_none());
        camera.request();
        advance(Duration::from_secs(20)).await;
        assert!(camera.poll().is_none());
        // manual request pushes the refresh out
        camera.request();
        advance(Duration::from_secs(20)).await;
        assert!(camera.poll().is_none());
        advance(Duration::from_secs(10)).await;
        assert_eq!(camera.poll(), Some(Command::Snapshot));
        assert!(camera.next_refresh().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_clears_waiting() {
        let mut camera = Camera::default();

        camera.request();
        camera.got_snapshot(SnapshotPayload::Encoded("aGVsbG8=".into()));
        assert!(!camera.is_waiting());
        assert_eq!(camera.latest().map(|s| s.payload.len()), Some(8));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_refresh_and_forgets_image() {
        let mut camera = Camera::default();

        camera.request();
        camera.got_snapshot(SnapshotPayload::Raw(vec![1, 2, 3]));
        camera.disconnected();

        assert!(camera.latest().is_none());
        assert!(camera.next_refresh().is_none());
        advance(Duration::from_secs(60)).await;
        assert!(camera.poll().is_none());
        // limiter was reset
        assert_eq!(camera.request(), Some(Command::Snapshot));
    }
}
