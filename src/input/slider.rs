use super::rate_limiter::RateLimiter;
use crate::protocol::{clamp_control_range, Axis, Command};
use tokio::time::Duration;

/// Head-turn slider in [-1, 1] that springs back to centre when let go.
#[derive(Debug, Clone)]
pub struct HeadSlider {
    limiter: RateLimiter,
    value: f64,
}

impl HeadSlider {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: RateLimiter::new(interval),
            value: 0.0,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Slider dragged to `value`. The position always updates; the command
    /// only goes out when the throttle allows it.
    pub fn slide(&mut self, value: f64) -> Option<Command> {
        self.value = clamp_control_range(value);
        let value = self.value;
        self.limiter
            .call(|| Command::begin(Axis::HeadTurn, value))
    }

    /// Drag finished: snap to centre and stop.
    pub fn released(&mut self) -> Command {
        self.value = 0.0;
        Command::Stop
    }

    pub fn disconnected(&mut self) {
        self.value = 0.0;
        self.limiter.reset();
    }
}

impl Default for HeadSlider {
    fn default() -> Self {
        Self::new(Duration::from_millis(super::DEFAULT_CONTROL_INTERVAL_MS))
    }
}
