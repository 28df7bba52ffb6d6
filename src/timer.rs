//! Scheduled-callback-with-cancel primitive.
//!
//! A [`Timer`] does not run anything by itself. Its owner asks it for the next
//! deadline (to sleep on, or to poll once per UI frame) and calls
//! [`Timer::take_due`] when time has passed; the owner then performs the
//! action. This keeps every timer on the single thread of its owner, which is
//! what lets the session hold its "at most one pending reconnect" invariant
//! without locks.

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Timer {
    period: Duration,
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Cancels any pending firing and schedules a new one `period` from `now`.
    pub fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.period);
    }

    /// Schedules a firing unless one is already pending.
    ///
    /// Returns `true` if a new firing was scheduled.
    pub fn schedule_once(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.period);
        true
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consumes the pending firing if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
