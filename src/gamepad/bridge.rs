use super::{GamepadEvent, PadButton};
use crate::input::{DriveJoystick, HeadSlider, InputAction, InputLatch};
use crate::protocol::Command;
use std::collections::HashMap;
use tokio::time::Duration;
use tracing::debug;

/// Turns pad input into panel actions through the same input sources the
/// on-screen controls use. A stick returning to centre counts as letting go.
pub struct GamepadBridge {
    joystick: DriveJoystick,
    head: HeadSlider,
    buttons: HashMap<PadButton, InputLatch<InputAction>>,
    drive_engaged: bool,
    head_engaged: bool,
}

impl GamepadBridge {
    pub fn new(joystick: DriveJoystick, head: HeadSlider, button_interval: Duration) -> Self {
        let one_off = |action: InputAction| InputLatch::one_off(button_interval, action);
        let buttons = HashMap::from([
            (PadButton::South, one_off(InputAction::Snapshot)),
            (PadButton::East, one_off(InputAction::Send(Command::Stop))),
            (
                PadButton::North,
                one_off(InputAction::Send(Command::ToggleLights)),
            ),
        ]);

        Self {
            joystick,
            head,
            buttons,
            drive_engaged: false,
            head_engaged: false,
        }
    }

    pub fn handle(&mut self, event: GamepadEvent) -> Vec<InputAction> {
        match event {
            GamepadEvent::DriveStick { x, y } => {
                if x == 0.0 && y == 0.0 {
                    if !self.drive_engaged {
                        return Vec::new();
                    }
                    self.drive_engaged = false;
                    debug!("Drive stick centred");
                    return vec![InputAction::Send(self.joystick.released())];
                }
                self.drive_engaged = true;
                self.joystick
                    .moved(f64::from(x), f64::from(y))
                    .into_iter()
                    .map(InputAction::Send)
                    .collect()
            }
            GamepadEvent::HeadStick { x } => {
                if x == 0.0 {
                    if !self.head_engaged {
                        return Vec::new();
                    }
                    self.head_engaged = false;
                    debug!("Head stick centred");
                    return vec![InputAction::Send(self.head.released())];
                }
                self.head_engaged = true;
                self.head
                    .slide(f64::from(x))
                    .map(InputAction::Send)
                    .into_iter()
                    .collect()
            }
            GamepadEvent::Button { button, pressed } => {
                let Some(latch) = self.buttons.get_mut(&button) else {
                    return Vec::new();
                };
                let action = if pressed { latch.down() } else { latch.up() };
                action.into_iter().collect()
            }
        }
    }

    pub fn disconnected(&mut self) {
        self.joystick.disconnected();
        self.head.disconnected();
        for latch in self.buttons.values_mut() {
            latch.disconnected();
        }
    }
}

impl Default for GamepadBridge {
    fn default() -> Self {
        Self::new(
            DriveJoystick::default(),
            HeadSlider::default(),
            Duration::from_millis(crate::input::DEFAULT_CONTROL_INTERVAL_MS),
        )
    }
}
