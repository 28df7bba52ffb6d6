use super::{GamepadError, GamepadEvent, PadButton};
use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub deadzone: f32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self { deadzone: 0.05 }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,

    // Nur Events dieses Gamepads werden weitergereicht
    active_gamepad: Option<GamepadId>,

    settings: CollectorSettings,

    events: mpsc::Sender<GamepadEvent>,

    // Letzte Stick-Werte, gilrs meldet die Achsen einzeln
    left_x: f32,
    left_y: f32,
    right_x: f32,
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: CollectorSettings,
        events: mpsc::Sender<GamepadEvent>,
    ) -> Result<Self, GamepadError> {
        debug!("Creating gamepad collector with settings: {:?}", settings);

        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(GamepadError::Initialization(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, settings, events, 0.0, 0.0, 0.0))
    }

    /// Picks the first connected gamepad and starts collecting.
    pub fn initialize(mut self) -> EventCollector<Collecting> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, taking the first one that shows up");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            self.active_gamepad = Some(*id);
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
        }

        self.transition()
    }
}

impl EventCollector<Collecting> {
    /// Polls gilrs until `shutdown` fires or the receiver is gone.
    pub fn run(&mut self, shutdown: &CancellationToken) {
        info!("Gamepad collector running");

        while !shutdown.is_cancelled() {
            match self.collect_next_event() {
                Ok(true) => {}
                Ok(false) => std::thread::sleep(std::time::Duration::from_millis(2)),
                Err(GamepadError::ChannelClosed) => {
                    info!("Gamepad event receiver dropped, stopping collector");
                    break;
                }
                Err(e) => error!("Error collecting gamepad event: {}", e),
            }
        }

        info!("Gamepad collector stopped");
    }

    /// Returns `Ok(false)` when gilrs had nothing queued.
    fn collect_next_event(&mut self) -> Result<bool, GamepadError> {
        let Some(Event { id, event, .. }) = self.gilrs.next_event() else {
            return Ok(false);
        };

        match (&event, self.active_gamepad) {
            (EventType::Connected, None) => {
                info!("Gamepad {} connected, selecting it", id);
                self.active_gamepad = Some(id);
                return Ok(true);
            }
            (EventType::Disconnected, Some(active)) if active == id => {
                warn!("Active gamepad {} disconnected", id);
                self.active_gamepad = None;
                // Sticks of a vanished pad count as centred
                self.left_x = 0.0;
                self.left_y = 0.0;
                self.right_x = 0.0;
                self.send(GamepadEvent::DriveStick { x: 0.0, y: 0.0 })?;
                self.send(GamepadEvent::HeadStick { x: 0.0 })?;
                return Ok(true);
            }
            (_, Some(active)) if active != id => {
                debug!("Skipping event from non-active gamepad: {:?}", id);
                return Ok(true);
            }
            _ => {}
        }

        if let Some(event) = self.convert(event) {
            self.send(event)?;
        }
        Ok(true)
    }

    fn send(&self, event: GamepadEvent) -> Result<(), GamepadError> {
        match self.events.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Gamepad queue full, dropping {:?}", event);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(GamepadError::ChannelClosed),
        }
    }

    fn convert(&mut self, event: EventType) -> Option<GamepadEvent> {
        let deadzone = self.settings.deadzone;

        match event {
            EventType::AxisChanged(axis, value, _) => {
                let value = apply_deadzone(value, deadzone);
                match axis {
                    Axis::LeftStickX => self.left_x = value,
                    Axis::LeftStickY => self.left_y = value,
                    Axis::RightStickX => {
                        if value == self.right_x {
                            return None;
                        }
                        self.right_x = value;
                        return Some(GamepadEvent::HeadStick { x: value });
                    }
                    _ => {
                        debug!("Ignoring unsupported axis: {:?}", axis);
                        return None;
                    }
                }
                Some(GamepadEvent::DriveStick {
                    x: self.left_x,
                    y: self.left_y,
                })
            }
            EventType::ButtonPressed(button, _) => map_button(button).map(|button| {
                info!(
                    "Button pressed: {:?} at {}",
                    button,
                    Local::now().format("%H:%M:%S.%3f")
                );
                GamepadEvent::Button {
                    button,
                    pressed: true,
                }
            }),
            EventType::ButtonReleased(button, _) => map_button(button).map(|button| {
                debug!("Button released: {:?}", button);
                GamepadEvent::Button {
                    button,
                    pressed: false,
                }
            }),
            _ => {
                debug!("Unhandled event type: {:?}", event);
                None
            }
        }
    }
}

fn map_button(button: Button) -> Option<PadButton> {
    match button {
        Button::South => Some(PadButton::South),
        Button::East => Some(PadButton::East),
        Button::North => Some(PadButton::North),
        _ => None,
    }
}

/// Zeroes values inside the deadzone and rescales the rest back to [-1, 1].
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadzone_zeroes_small_values_and_rescales() {
        assert_eq!(apply_deadzone(0.04, 0.05), 0.0);
        assert_eq!(apply_deadzone(-0.04, 0.05), 0.0);
        assert_eq!(apply_deadzone(1.0, 0.05), 1.0);
        assert_eq!(apply_deadzone(-1.0, 0.05), -1.0);
        let half = apply_deadzone(0.525, 0.05);
        assert!((half - 0.5).abs() < 1e-6);
    }

    #[test]
    fn only_bound_buttons_are_mapped() {
        assert_eq!(map_button(Button::South), Some(PadButton::South));
        assert_eq!(map_button(Button::East), Some(PadButton::East));
        assert_eq!(map_button(Button::North), Some(PadButton::North));
        assert_eq!(map_button(Button::West), None);
        assert_eq!(map_button(Button::Start), None);
    }
}
