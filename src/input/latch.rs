//! Press/hold/release tracking for discrete keys and buttons.
//!
//! An [`InputLatch`] gives a key continuous-style semantics: the bound begin
//! action goes out on the first press and, for repeating latches, again at the
//! limiter's rate while the key stays down. The release action is never
//! throttled, because a dropped release leaves the device moving.

use super::rate_limiter::RateLimiter;
use tokio::time::Duration;

#[derive(Debug, Clone)]
pub struct InputLatch<A> {
    limiter: RateLimiter,
    held: bool,
    repeat: bool,
    begin: A,
    release: Option<A>,
}

impl<A: Clone> InputLatch<A> {
    pub fn new(repeat_interval: Duration, repeat: bool, begin: A, release: Option<A>) -> Self {
        Self {
            limiter: RateLimiter::new(repeat_interval),
            held: false,
            repeat,
            begin,
            release,
        }
    }

    /// Latch that re-fires `begin` while held and fires `release` on key up.
    pub fn repeating(repeat_interval: Duration, begin: A, release: A) -> Self {
        Self::new(repeat_interval, true, begin, Some(release))
    }

    /// Latch that fires `begin` once per press and nothing on key up.
    pub fn one_off(repeat_interval: Duration, begin: A) -> Self {
        Self::new(repeat_interval, false, begin, None)
    }

    /// Key went down (or the platform sent an auto-repeat).
    ///
    /// Returns the begin action when it should fire.
    pub fn down(&mut self) -> Option<A> {
        if !self.limiter.should_process() {
            return None;
        }
        let fire = !self.held || self.repeat;
        self.held = true;
        fire.then(|| self.begin.clone())
    }

    /// Key went up. Always returns the release action, if one is bound.
    pub fn up(&mut self) -> Option<A> {
        self.held = false;
        self.limiter.reset();
        self.release.clone()
    }

    /// Session dropped: forget everything without firing.
    pub fn disconnected(&mut self) {
        self.held = false;
        self.limiter.reset();
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}
