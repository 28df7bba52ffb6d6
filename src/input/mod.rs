//! Input sources of the panel
//!
//! Each source turns raw UI or gamepad events into the [`Command`]s to
//! dispatch. Sources never talk to the session directly, the caller forwards
//! what they return:
//!
//! ```text
//! egui / gilrs ──► Keyboard, DriveJoystick, HeadSlider, VoiceMenu, Camera
//!                       │ (RateLimiter / InputLatch)
//!                       ▼
//!                  SessionHandle::send
//! ```
//!
//! Every source has a `disconnected()` reset that the owner calls when the
//! session reports a lost connection.
//!
//! [`Command`]: crate::protocol::Command

pub mod camera;
pub mod joystick;
pub mod keyboard;
pub mod latch;
pub mod rate_limiter;
pub mod slider;
pub mod voice;

pub use camera::Camera;
pub use joystick::DriveJoystick;
pub use keyboard::{ControlKey, InputAction, Keyboard};
pub use latch::InputLatch;
pub use rate_limiter::RateLimiter;
pub use slider::HeadSlider;
pub use voice::VoiceMenu;

/// Throttle for key repeat, joystick and slider
pub const DEFAULT_CONTROL_INTERVAL_MS: u64 = 500;

/// Throttle for snapshots and sound playback
pub const DEFAULT_MEDIA_INTERVAL_MS: u64 = 2000;

/// Minimum joystick deflection on an axis before it is sent
pub const DEFAULT_JOYSTICK_THRESHOLD: f64 = 0.1;

/// Period of the camera auto-refresh
pub const DEFAULT_CAMERA_REFRESH_MS: u64 = 30_000;
