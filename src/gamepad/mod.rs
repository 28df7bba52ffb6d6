//! Gamepad support
//!
//! The physical counterpart of the on-screen controls:
//!
//! ```text
//! gilrs ──► EventCollector (own OS thread) ──[GamepadEvent]──► GamepadBridge (panel)
//! ```
//!
//! The left stick drives, the right stick's X axis turns the head, South takes
//! a snapshot, East stops and North toggles the lights.

pub mod bridge;
pub mod collector;

use collector::{CollectorSettings, EventCollector};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use bridge::GamepadBridge;

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Buttons the panel binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadButton {
    South,
    East,
    North,
}

/// Deadzone-filtered pad input
#[derive(Debug, Clone, PartialEq)]
pub enum GamepadEvent {
    DriveStick { x: f32, y: f32 },
    HeadStick { x: f32 },
    Button { button: PadButton, pressed: bool },
}

#[derive(Debug, thiserror::Error)]
pub enum GamepadError {
    #[error("Failed to initialize gamepad input: {0}")]
    Initialization(String),

    #[error("Failed to spawn gamepad thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Gamepad event receiver is gone")]
    ChannelClosed,
}

/// Owns the collector thread.
pub struct GamepadHandle {
    shutdown: CancellationToken,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl GamepadHandle {
    /// Starts collecting on a dedicated thread. gilrs is not `Send`, so the
    /// collector is created on that thread; setup errors are handed back here.
    pub fn spawn(
        deadzone: f32,
        shutdown: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<GamepadEvent>), GamepadError> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (init_tx, init_rx) = std::sync::mpsc::channel();
        let token = shutdown.clone();

        let thread = std::thread::Builder::new()
            .name("gamepad".into())
            .spawn(move || {
                let settings = CollectorSettings { deadzone };
                let collector = match EventCollector::create(settings, events_tx) {
                    Ok(collector) => {
                        let _ = init_tx.send(Ok(()));
                        collector
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                collector.initialize().run(&token);
            })?;

        match init_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(GamepadError::Initialization(
                    "gamepad thread exited during setup".into(),
                ))
            }
        }

        info!("Gamepad collector started");
        Ok((
            Self {
                shutdown,
                thread: Some(thread),
            },
            events_rx,
        ))
    }

    pub fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Gamepad thread panicked");
            }
        }
    }
}

impl Drop for GamepadHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
