//! Rate-Limiter für kontinuierliche Eingaben

use tokio::time::{Duration, Instant};

/// Drops calls that arrive sooner than `min_interval` after the last one that
/// went through.
///
/// Every continuous input (joystick drag, slider drag, held key) emits many
/// events per second; each source owns one limiter so that only a few of them
/// become wire traffic.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Minimaler Zeitabstand zwischen zwei Aufrufen
    min_interval: Duration,

    /// Zeitpunkt des letzten erfolgreichen Aufrufs, `None` nach einem Reset
    last_fired: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_fired: None,
        }
    }

    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Returns `true` (and restarts the clock) if a call may go through now.
    pub fn should_process(&mut self) -> bool {
        let now = Instant::now();
        let due = match self.last_fired {
            Some(last) => now.duration_since(last) >= self.min_interval,
            None => true,
        };
        if due {
            self.last_fired = Some(now);
        }
        due
    }

    /// Runs `action` if the limiter lets the call through.
    pub fn call<R>(&mut self, action: impl FnOnce() -> R) -> Option<R> {
        if self.should_process() {
            Some(action())
        } else {
            None
        }
    }

    /// Forgets the last call so the next one always fires.
    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn drops_calls_inside_the_interval() {
        let mut limiter = RateLimiter::from_millis(500);
        let mut fired = Vec::new();

        // t = 0
        limiter.call(|| fired.push(0));
        advance(Duration::from_millis(100)).await;
        limiter.call(|| fired.push(100));
        advance(Duration::from_millis(500)).await;
        limiter.call(|| fired.push(600));

        assert_eq!(fired, vec![0, 600]);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_is_measured_from_last_successful_call() {
        let mut limiter = RateLimiter::from_millis(500);
        assert!(limiter.should_process());
        advance(Duration::from_millis(400)).await;
        assert!(!limiter.should_process());
        // dropped call at 400 must not restart the clock
        advance(Duration::from_millis(100)).await;
        assert!(limiter.should_process());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_lets_next_call_through() {
        let mut limiter = RateLimiter::from_millis(2000);
        assert_eq!(limiter.call(|| 1), Some(1));
        assert_eq!(limiter.call(|| 2), None);
        limiter.reset();
        assert_eq!(limiter.call(|| 3), Some(3));
    }
}
