//! Remote-control panel for the Dalek.
//!
//! ```text
//! ui ──► input ──► session (runner ─► control ─► protocol) ──► websocket
//!  ▲                   │
//!  └── SessionEvent ───┘
//! ```

pub mod config;
pub mod gamepad;
pub mod input;
pub mod protocol;
pub mod session;
pub mod timer;
pub mod ui;
