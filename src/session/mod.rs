//! # Control Session
//!
//! Owns the connection to the device, tracks whether the device is available
//! and gates every user command on that.
//!
//! ## Why This Module Exists
//!
//! The device accepts exactly one operator at a time and can vanish at any
//! moment (Wi-Fi, battery, someone else grabbing it first). Every input on the
//! panel therefore has to ask the same question before it sends anything: is
//! the device provably ready for *us*? Collapsing that question into one small
//! state machine keeps command floods away from a socket the device considers
//! occupied or severed, and lets every widget react to the same three states.
//!
//! ## Module Layout
//!
//! ```text
//! session/
//! ├── transport.rs  - Transport/Connector seam, link identities and events
//! ├── control.rs    - ControlSession: the synchronous state machine
//! ├── websocket.rs  - tokio-tungstenite connector used in production
//! └── runner.rs     - async driver task and the cloneable SessionHandle
//! ```
//!
//! ## State Machine
//!
//! ```text
//! from          on            to            notifies
//! Disconnected  ready frame   Ready         on_ready, on_battery_update
//! Disconnected  busy frame    Busy          on_busy (once)
//! Ready         busy frame    Busy          on_busy (link closed by us)
//! Ready         close/error   Disconnected  on_disconnected
//! Busy          close/error   Disconnected  -
//! Busy          ready frame   Ready         on_ready, on_battery_update
//! ```
//!
//! Every close/error schedules one reconnect attempt after the fixed delay.
//!
//! ## Threading
//!
//! [`ControlSession`] is plain synchronous code with a single owner: the
//! runner task. Link I/O, UI requests and timers all funnel into that task,
//! so the state has exactly one writer and needs no locks.

pub mod control;
pub mod runner;
pub mod transport;
pub mod websocket;

use crate::protocol::{BatteryLevel, SnapshotPayload};
use std::fmt;
use tokio::time::Duration;

pub use control::ControlSession;
pub use runner::{SessionHandle, SessionRunner};
pub use transport::{Connector, LinkEvent, LinkId, Transport, TransportError};

/// Default delay between losing a link and the next connection attempt
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

/// Connectivity state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// The device is serving another operator
    Busy,
    /// The device accepted us; commands go out
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "Disconnected"),
            SessionState::Busy => write!(f, "Busy"),
            SessionState::Ready => write!(f, "Ready"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub reconnect_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
        }
    }
}

/// Lifecycle callbacks delivered by the session.
///
/// Each callback fires at most once per actual transition; repeated inbound
/// signals of the same kind are coalesced by the session.
pub trait SessionListener {
    fn on_ready(&mut self, battery: BatteryLevel);
    fn on_busy(&mut self);
    fn on_disconnected(&mut self);
    fn on_battery_update(&mut self, level: BatteryLevel);
    fn on_snapshot(&mut self, payload: SnapshotPayload);
}

/// Lifecycle callbacks as messages, for collaborators on other tasks/threads.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Ready(BatteryLevel),
    Busy,
    Disconnected,
    Battery(BatteryLevel),
    Snapshot(SnapshotPayload),
}
