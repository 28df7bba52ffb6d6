use super::rate_limiter::RateLimiter;
use crate::protocol::{Axis, Command};
use tokio::time::Duration;
use tracing::debug;

/// Two-axis drive control. `y` drives forward/back, `x` turns.
#[derive(Debug, Clone)]
pub struct DriveJoystick {
    limiter: RateLimiter,
    threshold: f64,
}

impl DriveJoystick {
    pub fn new(interval: Duration, threshold: f64) -> Self {
        Self {
            limiter: RateLimiter::new(interval),
            threshold,
        }
    }

    /// Stick moved to (`x`, `y`), both in [-1, 1].
    ///
    /// Returns the commands to send; empty when throttled or inside the
    /// threshold on both axes.
    pub fn moved(&mut self, x: f64, y: f64) -> Vec<Command> {
        let threshold = self.threshold;
        self.limiter
            .call(|| {
                let mut commands = Vec::with_capacity(2);
                if y.abs() > threshold {
                    commands.push(Command::begin(Axis::Drive, y));
                }
                if x.abs() > threshold {
                    commands.push(Command::begin(Axis::Turn, x));
                }
                debug!("Joystick ({:.2}, {:.2}) -> {} commands", x, y, commands.len());
                commands
            })
            .unwrap_or_default()
    }

    /// Stick let go.
    pub fn released(&mut self) -> Command {
        Command::Stop
    }

    pub fn disconnected(&mut self) {
        self.limiter.reset();
    }
}

impl Default for DriveJoystick {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(super::DEFAULT_CONTROL_INTERVAL_MS),
            super::DEFAULT_JOYSTICK_THRESHOLD,
        )
    }
}
