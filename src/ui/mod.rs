//! # Dalek Remote Panel
//!
//! eframe window that replaces the browser control page. It draws the
//! [`PanelState`] and feeds it with keyboard, mouse, gamepad and session
//! events once per frame.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ status: connectivity · battery · snapshot age │
//! ├───────────────────────┬──────────────────────┤
//! │ camera                │ drive pad            │
//! │ voice menu            │ head slider          │
//! │                       │ lights · stop · exit │
//! └───────────────────────┴──────────────────────┘
//! ```
//!
//! While the session is not ready a modal with the connectivity message
//! covers the controls.
//!
//! ## Threading
//!
//! egui runs on the main thread. Session events arrive over a broadcast
//! receiver and gamepad events over an mpsc receiver, both drained with
//! `try_recv` at the start of every frame; commands leave through the
//! [`SessionHandle`]. Nothing here blocks.

pub mod panel;
pub mod status;

use crate::config::RemoteConfig;
use crate::gamepad::GamepadEvent;
use crate::input::ControlKey;
use crate::protocol::Command;
use crate::session::{SessionEvent, SessionHandle};
use egui::{Color32, Key, Modal, RichText, Sense, Stroke, Vec2};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

pub use panel::{CommandSink, PanelState};

const DRIVE_PAD_RADIUS: f32 = 90.0;

pub struct UiColors;

impl UiColors {
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);
    pub const HANDLE: Color32 = Color32::from_rgb(61, 134, 203);
}

pub struct DalekRemoteUI {
    session: SessionHandle,
    events: broadcast::Receiver<SessionEvent>,
    gamepad: Option<mpsc::Receiver<GamepadEvent>>,
    panel: PanelState,
    endpoint: String,

    // Slider position while dragging, mirrors the head control
    head_value: f64,
    drive_active: bool,
}

impl DalekRemoteUI {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        session: SessionHandle,
        gamepad: Option<mpsc::Receiver<GamepadEvent>>,
        config: &RemoteConfig,
        endpoint: String,
    ) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        let events = session.subscribe();
        Self {
            session,
            events,
            gamepad,
            panel: PanelState::new(config),
            endpoint,
            head_value: 0.0,
            drive_active: false,
        }
    }

    fn drain_session_events(&mut self) {
        let mut lagged = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => self.panel.on_session_event(event, &self.session),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!("Panel missed {} session events", missed);
                    lagged = true;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        // Missed events may include a state change
        if lagged {
            self.panel.resync(self.session.state(), &self.session);
        }
    }

    fn drain_gamepad_events(&mut self) {
        let Some(gamepad) = self.gamepad.as_mut() else {
            return;
        };
        while let Ok(event) = gamepad.try_recv() {
            self.panel.gamepad(event, &self.session);
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        // Typing into a widget is not driving
        if ctx.wants_keyboard_input() {
            return;
        }
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            let egui::Event::Key { key, pressed, .. } = event else {
                continue;
            };
            let Some(key) = control_key(key) else {
                continue;
            };
            if pressed {
                self.panel.key_down(key, &self.session);
            } else {
                self.panel.key_up(key, &self.session);
            }
        }
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let (dot, color) = match self.panel.dialog.message() {
                None => ("● connected", UiColors::ACTIVE),
                Some(_) => ("● offline", UiColors::INACTIVE),
            };
            ui.label(RichText::new(dot).color(color));
            ui.label(self.endpoint.as_str());
            ui.separator();

            let battery = format!("Battery: {}", self.panel.battery.text());
            if self.panel.battery.is_low() {
                ui.label(RichText::new(battery).color(UiColors::INACTIVE).strong());
            } else {
                ui.label(battery);
            }
            if let Some(at) = self.panel.battery.updated_at() {
                ui.label(RichText::new(format!("({})", at.format("%H:%M:%S"))).weak());
            }
        });
    }

    fn camera_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Camera");
        ui.horizontal(|ui| {
            if ui.button("Snapshot").clicked() {
                self.panel.request_snapshot(&self.session);
            }
            if self.panel.camera.is_waiting() {
                ui.spinner();
            }
        });
        match self.panel.camera.latest() {
            Some(snapshot) => {
                ui.label(format!(
                    "Last snapshot: {} bytes at {}",
                    snapshot.payload.len(),
                    snapshot.received_at.format("%H:%M:%S")
                ));
            }
            None => {
                ui.label(RichText::new("No picture").weak());
            }
        }
    }

    fn voice_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Voice");
        let mut selected = self.panel.voice.selected_index();
        let selected_text = self.panel.voice.selected().unwrap_or("-").to_string();
        egui::ComboBox::from_id_salt("phrases")
            .selected_text(selected_text)
            .width(260.0)
            .show_ui(ui, |ui| {
                for (index, phrase) in self.panel.voice.phrases().iter().enumerate() {
                    ui.selectable_value(&mut selected, index, phrase.as_str());
                }
            });
        if selected != self.panel.voice.selected_index() {
            self.panel.voice.select(selected);
        }
        ui.horizontal(|ui| {
            if ui.button("Speak").clicked() {
                self.panel.play_sound(&self.session);
            }
            if ui.button("Silence").clicked() {
                self.panel.stop_sound(&self.session);
            }
        });
    }

    fn drive_pad(&mut self, ui: &mut egui::Ui) {
        ui.heading("Drive");
        let size = Vec2::splat(DRIVE_PAD_RADIUS * 2.0);
        let (rect, response) = ui.allocate_exact_size(size, Sense::drag());
        let center = rect.center();

        let mut handle = center;
        if let Some(pointer) = response.interact_pointer_pos() {
            let mut offset = pointer - center;
            if offset.length() > DRIVE_PAD_RADIUS {
                offset *= DRIVE_PAD_RADIUS / offset.length();
            }
            handle = center + offset;
            // Screen y grows downwards
            let x = f64::from(offset.x / DRIVE_PAD_RADIUS);
            let y = f64::from(-offset.y / DRIVE_PAD_RADIUS);
            self.drive_active = true;
            self.panel.drive_moved(x, y, &self.session);
        }
        if response.drag_stopped() && self.drive_active {
            self.drive_active = false;
            self.panel.drive_released(&self.session);
        }

        let painter = ui.painter_at(rect);
        painter.circle_stroke(center, DRIVE_PAD_RADIUS - 1.0, Stroke::new(1.0, UiColors::BORDER));
        painter.circle_filled(handle, 18.0, UiColors::HANDLE);
    }

    fn head_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Head");
        let response = ui.add(
            egui::Slider::new(&mut self.head_value, -1.0..=1.0)
                .step_by(0.01)
                .show_value(false),
        );
        if response.changed() {
            self.panel.head_moved(self.head_value, &self.session);
        }
        if response.drag_stopped() || response.clicked() {
            self.panel.head_released(&self.session);
        }
        if !response.dragged() {
            self.head_value = self.panel.head_position();
        }
    }

    fn action_buttons(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            if ui.button("Lights").clicked() {
                self.session.send(Command::ToggleLights);
            }
            if ui.button("Stop").clicked() {
                self.session.send(Command::Stop);
            }
            if ui.button("Verbose").clicked() {
                self.session.toggle_verbose();
            }
            if ui.button("Exit").clicked() {
                self.panel.exit(&self.session);
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    }

    fn connectivity_modal(&self, ctx: &egui::Context) {
        let Some(message) = self.panel.dialog.message() else {
            return;
        };
        Modal::new(egui::Id::new("connectivity")).show(ctx, |ui| {
            ui.set_width(320.0);
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(message);
            });
        });
    }
}

impl eframe::App for DalekRemoteUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_session_events();
        self.drain_gamepad_events();
        self.handle_keyboard(ctx);
        self.panel.tick(&self.session);

        egui::TopBottomPanel::top("status_bar")
            .show_separator_line(false)
            .show(ctx, |ui| self.status_bar(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.ctx().request_repaint_after(Duration::from_millis(33));
            ui.columns(2, |columns| {
                self.camera_section(&mut columns[0]);
                columns[0].add_space(12.0);
                self.voice_section(&mut columns[0]);

                self.drive_pad(&mut columns[1]);
                columns[1].add_space(12.0);
                self.head_section(&mut columns[1]);
                columns[1].add_space(12.0);
                self.action_buttons(&mut columns[1], ctx);
            });
        });

        self.connectivity_modal(ctx);
    }
}

fn control_key(key: Key) -> Option<ControlKey> {
    let mapped = match key {
        Key::W => ControlKey::W,
        Key::S => ControlKey::S,
        Key::A => ControlKey::A,
        Key::D => ControlKey::D,
        Key::Q => ControlKey::Q,
        Key::E => ControlKey::E,
        Key::V => ControlKey::V,
        Key::L => ControlKey::L,
        Key::Enter => ControlKey::Enter,
        _ => return None,
    };
    debug!("Mapped {:?} to {}", key, mapped);
    Some(mapped)
}
