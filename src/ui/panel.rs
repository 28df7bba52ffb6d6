//! Panel model
//!
//! Everything the window shows or reacts to, minus the drawing. The egui layer
//! feeds raw input and session events in here; commands leave through a
//! [`CommandSink`].

use super::status::{BatteryIndicator, ConnectivityDialog};
use crate::config::RemoteConfig;
use crate::gamepad::{GamepadBridge, GamepadEvent};
use crate::input::{
    Camera, ControlKey, DriveJoystick, HeadSlider, InputAction, Keyboard, VoiceMenu,
};
use crate::protocol::Command;
use crate::session::{SessionEvent, SessionHandle, SessionState};
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Where the panel's commands go
pub trait CommandSink {
    fn send(&self, command: Command);
    fn toggle_verbose(&self);
}

impl CommandSink for SessionHandle {
    fn send(&self, command: Command) {
        SessionHandle::send(self, command);
    }

    fn toggle_verbose(&self) {
        SessionHandle::toggle_verbose(self);
    }
}

pub struct PanelState {
    state: SessionState,
    pub dialog: ConnectivityDialog,
    pub battery: BatteryIndicator,
    pub camera: Camera,
    pub voice: VoiceMenu,
    keyboard: Keyboard,
    joystick: DriveJoystick,
    head: HeadSlider,
    gamepad: GamepadBridge,
}

impl PanelState {
    pub fn new(config: &RemoteConfig) -> Self {
        let control = Duration::from_millis(config.input.control_interval_ms);
        let media = Duration::from_millis(config.input.media_interval_ms);
        let threshold = config.input.joystick_threshold;

        Self {
            state: SessionState::Disconnected,
            dialog: ConnectivityDialog::new(),
            battery: BatteryIndicator::new(config.ui.low_battery_threshold),
            camera: Camera::new(media, Duration::from_millis(config.input.camera_refresh_ms)),
            voice: VoiceMenu::new(media, config.ui.phrases.clone()),
            keyboard: Keyboard::with_default_bindings(control),
            joystick: DriveJoystick::new(control, threshold),
            head: HeadSlider::new(control),
            gamepad: GamepadBridge::new(
                DriveJoystick::new(control, threshold),
                HeadSlider::new(control),
                control,
            ),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn on_session_event(&mut self, event: SessionEvent, sink: &impl CommandSink) {
        debug!("Panel received {:?}", event);
        match event {
            SessionEvent::Ready(battery) => {
                self.battery.set(battery);
                self.enter_ready(sink);
            }
            SessionEvent::Busy => self.enter_busy(),
            SessionEvent::Disconnected => self.enter_disconnected(),
            SessionEvent::Battery(level) => self.battery.set(level),
            SessionEvent::Snapshot(payload) => self.camera.got_snapshot(payload),
        }
    }

    /// Catches up with the session after lifecycle events were missed.
    pub fn resync(&mut self, state: SessionState, sink: &impl CommandSink) {
        if state == self.state {
            return;
        }
        warn!("Panel was {} but session is {}, resyncing", self.state, state);
        match state {
            SessionState::Ready => self.enter_ready(sink),
            SessionState::Busy => self.enter_busy(),
            SessionState::Disconnected => self.enter_disconnected(),
        }
    }

    fn enter_ready(&mut self, sink: &impl CommandSink) {
        self.state = SessionState::Ready;
        self.dialog.hide();
        self.request_snapshot(sink);
    }

    fn enter_busy(&mut self) {
        self.state = SessionState::Busy;
        self.dialog.busy();
    }

    fn enter_disconnected(&mut self) {
        info!("Connection lost, resetting controls");
        self.state = SessionState::Disconnected;
        self.battery.disconnected();
        self.camera.disconnected();
        self.head.disconnected();
        self.joystick.disconnected();
        self.voice.disconnected();
        self.keyboard.disconnected();
        self.gamepad.disconnected();
        self.dialog.lost();
    }

    pub fn key_down(&mut self, key: ControlKey, sink: &impl CommandSink) {
        if let Some(action) = self.keyboard.key_down(key, self.state) {
            self.dispatch(action, sink);
        }
    }

    pub fn key_up(&mut self, key: ControlKey, sink: &impl CommandSink) {
        if let Some(action) = self.keyboard.key_up(key, self.state) {
            self.dispatch(action, sink);
        }
    }

    pub fn gamepad(&mut self, event: GamepadEvent, sink: &impl CommandSink) {
        for action in self.gamepad.handle(event) {
            self.dispatch(action, sink);
        }
    }

    /// On-screen drive pad, both axes in [-1, 1] with up positive
    pub fn drive_moved(&mut self, x: f64, y: f64, sink: &impl CommandSink) {
        for command in self.joystick.moved(x, y) {
            sink.send(command);
        }
    }

    pub fn drive_released(&mut self, sink: &impl CommandSink) {
        sink.send(self.joystick.released());
    }

    pub fn head_position(&self) -> f64 {
        self.head.value()
    }

    pub fn head_moved(&mut self, value: f64, sink: &impl CommandSink) {
        if let Some(command) = self.head.slide(value) {
            sink.send(command);
        }
    }

    pub fn head_released(&mut self, sink: &impl CommandSink) {
        sink.send(self.head.released());
    }

    pub fn play_sound(&mut self, sink: &impl CommandSink) {
        if let Some(command) = self.voice.play() {
            sink.send(command);
        }
    }

    pub fn stop_sound(&mut self, sink: &impl CommandSink) {
        sink.send(self.voice.stop());
    }

    pub fn request_snapshot(&mut self, sink: &impl CommandSink) {
        if let Some(command) = self.camera.request() {
            sink.send(command);
        }
    }

    /// Runs once per frame.
    pub fn tick(&mut self, sink: &impl CommandSink) {
        if let Some(command) = self.camera.poll() {
            sink.send(command);
        }
    }

    pub fn exit(&mut self, sink: &impl CommandSink) {
        info!("Exit requested");
        sink.send(Command::Exit);
    }

    fn dispatch(&mut self, action: InputAction, sink: &impl CommandSink) {
        match action {
            InputAction::Send(command) => sink.send(command),
            InputAction::ToggleVerbose => sink.toggle_verbose(),
            InputAction::Snapshot => self.request_snapshot(sink),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamepad::PadButton;
    use crate::protocol::{Axis, BatteryLevel, SnapshotPayload};
    use crate::ui::status::{BUSY_MESSAGE, LOST_MESSAGE};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        commands: RefCell<Vec<Command>>,
        verbose_toggles: RefCell<usize>,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<Command> {
            self.commands.borrow_mut().drain(..).collect()
        }
    }

    impl CommandSink for RecordingSink {
        fn send(&self, command: Command) {
            self.commands.borrow_mut().push(command);
        }

        fn toggle_verbose(&self) {
            *self.verbose_toggles.borrow_mut() += 1;
        }
    }

    fn battery(value: f64) -> BatteryLevel {
        BatteryLevel::new(value).unwrap()
    }

    fn ready_panel(sink: &RecordingSink) -> PanelState {
        let mut panel = PanelState::new(&RemoteConfig::default());
        panel.on_session_event(SessionEvent::Ready(battery(87.0)), sink);
        sink.take();
        panel
    }

    #[tokio::test(start_paused = true)]
    async fn ready_hides_dialog_and_requests_snapshot() {
        let sink = RecordingSink::default();
        let mut panel = PanelState::new(&RemoteConfig::default());
        assert_eq!(panel.dialog.message(), Some("Connecting..."));

        panel.on_session_event(SessionEvent::Ready(battery(87.0)), &sink);

        assert_eq!(panel.state(), SessionState::Ready);
        assert_eq!(panel.dialog.message(), None);
        assert_eq!(panel.battery.text(), "87");
        assert_eq!(sink.take(), vec![Command::Snapshot]);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_only_work_while_ready() {
        let sink = RecordingSink::default();
        let mut panel = PanelState::new(&RemoteConfig::default());

        panel.key_down(ControlKey::W, &sink);
        assert!(sink.take().is_empty());

        panel.on_session_event(SessionEvent::Ready(battery(50.0)), &sink);
        sink.take();
        panel.key_down(ControlKey::W, &sink);
        panel.key_up(ControlKey::W, &sink);
        assert_eq!(
            sink.take(),
            vec![
                Command::begin(Axis::Drive, 1.0),
                Command::release(Axis::Drive, 1.0)
            ]
        );

        panel.key_down(ControlKey::V, &sink);
        assert_eq!(*sink.verbose_toggles.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn return_key_shares_camera_throttle() {
        let sink = RecordingSink::default();
        // Ready already requested a snapshot
        let mut panel = ready_panel(&sink);

        panel.key_down(ControlKey::Enter, &sink);
        assert!(sink.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_and_disconnect_update_dialog_and_reset_sources() {
        let sink = RecordingSink::default();
        let mut panel = ready_panel(&sink);
        panel.on_session_event(
            SessionEvent::Snapshot(SnapshotPayload::Raw(vec![0xff, 0xd8])),
            &sink,
        );
        panel.head_moved(0.5, &sink);
        assert_eq!(sink.take(), vec![Command::begin(Axis::HeadTurn, 0.5)]);

        panel.on_session_event(SessionEvent::Disconnected, &sink);
        assert_eq!(panel.dialog.message(), Some(LOST_MESSAGE));
        assert_eq!(panel.battery.text(), "?");
        assert!(panel.camera.latest().is_none());
        assert_eq!(panel.head_position(), 0.0);

        // limiters were reset, so the next drag goes straight out
        panel.head_moved(0.2, &sink);
        assert_eq!(sink.take(), vec![Command::begin(Axis::HeadTurn, 0.2)]);

        panel.on_session_event(SessionEvent::Busy, &sink);
        assert_eq!(panel.dialog.message(), Some(BUSY_MESSAGE));
        assert_eq!(panel.state(), SessionState::Busy);
    }

    #[tokio::test(start_paused = true)]
    async fn key_released_while_busy_fires_again_after_ready() {
        let sink = RecordingSink::default();
        let mut panel = ready_panel(&sink);

        panel.key_down(ControlKey::L, &sink);
        assert_eq!(sink.take(), vec![Command::ToggleLights]);

        panel.on_session_event(SessionEvent::Busy, &sink);
        panel.key_up(ControlKey::L, &sink);
        assert!(sink.take().is_empty());

        tokio::time::advance(Duration::from_secs(10)).await;
        panel.on_session_event(SessionEvent::Ready(battery(80.0)), &sink);
        sink.take();
        panel.key_down(ControlKey::L, &sink);
        assert_eq!(sink.take(), vec![Command::ToggleLights]);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_catches_up_with_missed_transitions() {
        let sink = RecordingSink::default();
        let mut panel = PanelState::new(&RemoteConfig::default());

        // Ready was never seen
        panel.resync(SessionState::Ready, &sink);
        assert_eq!(panel.state(), SessionState::Ready);
        assert_eq!(panel.dialog.message(), None);
        assert_eq!(sink.take(), vec![Command::Snapshot]);
        panel.key_down(ControlKey::W, &sink);
        assert_eq!(sink.take(), vec![Command::begin(Axis::Drive, 1.0)]);

        // same state, nothing to do
        panel.resync(SessionState::Ready, &sink);
        assert!(sink.take().is_empty());

        panel.resync(SessionState::Disconnected, &sink);
        assert_eq!(panel.dialog.message(), Some(LOST_MESSAGE));
        assert_eq!(panel.battery.text(), "?");

        panel.resync(SessionState::Busy, &sink);
        assert_eq!(panel.dialog.message(), Some(BUSY_MESSAGE));
        panel.key_down(ControlKey::W, &sink);
        assert!(sink.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn on_screen_controls_emit_commands() {
        let sink = RecordingSink::default();
        let mut panel = ready_panel(&sink);

        panel.drive_moved(0.5, -0.5, &sink);
        panel.drive_released(&sink);
        panel.head_released(&sink);
        panel.play_sound(&sink);
        panel.stop_sound(&sink);
        panel.exit(&sink);

        assert_eq!(
            sink.take(),
            vec![
                Command::begin(Axis::Drive, -0.5),
                Command::begin(Axis::Turn, 0.5),
                Command::Stop,
                Command::Stop,
                Command::PlaySound("exterminate".into()),
                Command::StopSound,
                Command::Exit,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn camera_refreshes_on_tick() {
        let sink = RecordingSink::default();
        let mut panel = ready_panel(&sink);

        panel.tick(&sink);
        assert!(sink.take().is_empty());
        tokio::time::advance(Duration::from_secs(30)).await;
        panel.tick(&sink);
        assert_eq!(sink.take(), vec![Command::Snapshot]);
    }

    #[tokio::test(start_paused = true)]
    async fn gamepad_buttons_are_dispatched() {
        let sink = RecordingSink::default();
        let mut panel = ready_panel(&sink);

        panel.gamepad(
            GamepadEvent::Button {
                button: PadButton::North,
                pressed: true,
            },
            &sink,
        );
        tokio::time::advance(Duration::from_secs(2)).await;
        panel.gamepad(
            GamepadEvent::Button {
                button: PadButton::South,
                pressed: true,
            },
            &sink,
        );

        assert_eq!(sink.take(), vec![Command::ToggleLights, Command::Snapshot]);
    }
}
