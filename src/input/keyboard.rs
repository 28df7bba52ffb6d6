//! Keyboard bindings
//!
//! Movement keys are command keys: they begin a movement on press, repeat it
//! while held and release it on key up. The remaining keys are one-off keys.
//! Keys only do anything while the session is ready.

use super::latch::InputLatch;
use crate::protocol::{Axis, Command};
use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::time::Duration;
use tracing::debug;

/// Keys the panel listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKey {
    W,
    S,
    A,
    D,
    Q,
    E,
    V,
    L,
    Enter,
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKey::Enter => write!(f, "Return"),
            other => write!(f, "{:?}", other),
        }
    }
}

/// What a key or pad button asks for
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    Send(Command),
    ToggleVerbose,
    /// Goes through the camera so it shares the snapshot throttle
    Snapshot,
}

pub struct Keyboard {
    latches: HashMap<ControlKey, InputLatch<InputAction>>,
}

impl Keyboard {
    /// W/S drive, A/D turn, Q/E head, V verbose, L lights, Return snapshot.
    pub fn with_default_bindings(repeat_interval: Duration) -> Self {
        let command_key = |axis: Axis, value: f64| {
            InputLatch::repeating(
                repeat_interval,
                InputAction::Send(Command::begin(axis, value)),
                InputAction::Send(Command::release(axis, value)),
            )
        };
        let one_off = |action: InputAction| InputLatch::one_off(repeat_interval, action);

        let latches = HashMap::from([
            (ControlKey::W, command_key(Axis::Drive, 1.0)),
            (ControlKey::S, command_key(Axis::Drive, -1.0)),
            (ControlKey::A, command_key(Axis::Turn, -1.0)),
            (ControlKey::D, command_key(Axis::Turn, 1.0)),
            (ControlKey::Q, command_key(Axis::HeadTurn, -1.0)),
            (ControlKey::E, command_key(Axis::HeadTurn, 1.0)),
            (ControlKey::V, one_off(InputAction::ToggleVerbose)),
            (
                ControlKey::L,
                one_off(InputAction::Send(Command::ToggleLights)),
            ),
            (ControlKey::Enter, one_off(InputAction::Snapshot)),
        ]);

        Self { latches }
    }

    pub fn is_bound(&self, key: ControlKey) -> bool {
        self.latches.contains_key(&key)
    }

    /// Key pressed or auto-repeated by the platform.
    pub fn key_down(&mut self, key: ControlKey, state: SessionState) -> Option<InputAction> {
        if state != SessionState::Ready {
            return None;
        }
        let action = self.latches.get_mut(&key)?.down();
        if let Some(action) = &action {
            debug!("Key {} down -> {:?}", key, action);
        }
        action
    }

    /// Key released. The latch always sees the release so a key let go
    /// while busy is re-armed for the next press; the action only comes
    /// back while ready.
    pub fn key_up(&mut self, key: ControlKey, state: SessionState) -> Option<InputAction> {
        let action = self.latches.get_mut(&key)?.up();
        if state != SessionState::Ready {
            return None;
        }
        if let Some(action) = &action {
            debug!("Key {} up -> {:?}", key, action);
        }
        action
    }

    pub fn disconnected(&mut self) {
        for latch in self.latches.values_mut() {
            latch.disconnected();
        }
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::with_default_bindings(Duration::from_millis(super::DEFAULT_CONTROL_INTERVAL_MS))
    }
}
