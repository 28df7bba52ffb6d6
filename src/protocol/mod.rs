//! # Wire Protocol
//!
//! Typed representation of everything that travels over the control socket.
//!
//! The device speaks a very small text protocol: every frame is a JSON array
//! terminated by a line break, the first element is the tag and the remaining
//! elements are positional arguments (strings or numbers). Snapshot images may
//! also arrive as binary WebSocket messages, which carry no tag at all.
//!
//! ```text
//! outbound: ["begin", "drive", 1.0]\n     inbound: ["ready", "87"]\n
//!           ["release", "turn", -1.0]\n            ["busy"]\n
//!           ["playsound", "Exterminate"]\n         ["battery", "86"]\n
//!           ["stop"]\n                             ["snapshot", "<base64>"]\n
//!                                                  <binary jpeg bytes>
//! ```
//!
//! ## Module Layout
//!
//! - [`codec`] - stateless encode/decode functions
//! - [`error`] - [`DecodeError`] taxonomy
//!
//! Everything the rest of the crate needs is re-exported here.

pub mod codec;
pub mod error;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use codec::{decode, encode, split_frame};
pub use error::DecodeError;

/// Outbound tags
pub const TAG_BEGIN: &str = "begin";
pub const TAG_RELEASE: &str = "release";
pub const TAG_STOP: &str = "stop";
pub const TAG_PLAY_SOUND: &str = "playsound";
pub const TAG_STOP_SOUND: &str = "stopsound";
pub const TAG_SNAPSHOT: &str = "snapshot";
pub const TAG_TOGGLE_LIGHTS: &str = "togglelights";
pub const TAG_EXIT: &str = "exit";

/// Inbound tags (`snapshot` is shared with the outbound request)
pub const TAG_READY: &str = "ready";
pub const TAG_BUSY: &str = "busy";
pub const TAG_BATTERY: &str = "battery";

/// One of the three continuous control dimensions of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Drive,
    Turn,
    HeadTurn,
}

impl Axis {
    /// Name used on the wire
    pub const fn wire_name(self) -> &'static str {
        match self {
            Axis::Drive => "drive",
            Axis::Turn => "turn",
            Axis::HeadTurn => "headturn",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "drive" => Some(Axis::Drive),
            "turn" => Some(Axis::Turn),
            "headturn" => Some(Axis::HeadTurn),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A user-originated request for the device.
///
/// Commands are transient: input sources build them and hand them straight to
/// the session, which either transmits them (session ready) or drops them.
/// Nothing is ever queued for later delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start moving along an axis with a normalized value in [-1.0, 1.0]
    Begin { axis: Axis, value: f64 },
    /// Stop the movement previously started with the same axis and value
    Release { axis: Axis, value: f64 },
    /// Stop all movement
    Stop,
    /// Speak or play the named phrase
    PlaySound(String),
    StopSound,
    /// Ask the device for a fresh camera image
    Snapshot,
    ToggleLights,
    /// Ask the device to shut down its control server
    Exit,
}

impl Command {
    /// Builds a [`Command::Begin`], clamping the value into the control range.
    pub fn begin(axis: Axis, value: f64) -> Self {
        Command::Begin {
            axis,
            value: clamp_control_range(value),
        }
    }

    /// Builds a [`Command::Release`], clamping the value into the control range.
    pub fn release(axis: Axis, value: f64) -> Self {
        Command::Release {
            axis,
            value: clamp_control_range(value),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Command::Begin { .. } => TAG_BEGIN,
            Command::Release { .. } => TAG_RELEASE,
            Command::Stop => TAG_STOP,
            Command::PlaySound(_) => TAG_PLAY_SOUND,
            Command::StopSound => TAG_STOP_SOUND,
            Command::Snapshot => TAG_SNAPSHOT,
            Command::ToggleLights => TAG_TOGGLE_LIGHTS,
            Command::Exit => TAG_EXIT,
        }
    }

    /// Positional arguments in wire order
    pub fn args(&self) -> Vec<WireValue> {
        match self {
            Command::Begin { axis, value } | Command::Release { axis, value } => {
                // Variants built by hand skip the constructors' clamp
                vec![
                    WireValue::from(axis.wire_name()),
                    WireValue::Number(clamp_control_range(*value)),
                ]
            }
            Command::PlaySound(name) => vec![WireValue::Text(name.clone())],
            Command::Stop
            | Command::StopSound
            | Command::Snapshot
            | Command::ToggleLights
            | Command::Exit => Vec::new(),
        }
    }

    /// Serializes the command into a newline-terminated text frame.
    pub fn encode(&self) -> String {
        encode(self.tag(), &self.args())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Begin { axis, value } => write!(f, "begin {} {:.2}", axis, value),
            Command::Release { axis, value } => write!(f, "release {} {:.2}", axis, value),
            Command::PlaySound(name) => write!(f, "playsound '{}'", name),
            other => f.write_str(other.tag()),
        }
    }
}

/// Keeps control values inside [-1.0, 1.0]; NaN becomes 0.0.
pub fn clamp_control_range(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// A single positional argument of a text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Text(String),
    Number(f64),
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::Text(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::Text(value)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        WireValue::Number(value)
    }
}

/// Raw unit of data as delivered by the transport.
///
/// Text and binary are distinguished by transport framing, not by content.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl WireFrame {
    pub fn len(&self) -> usize {
        match self {
            WireFrame::Text(text) => text.len(),
            WireFrame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Battery reading reported by the device.
///
/// Always finite and non-negative; the codec rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct BatteryLevel(f64);

impl BatteryLevel {
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{}", self.0 as u64)
        } else {
            write!(f, "{:.1}", self.0)
        }
    }
}

/// Camera image as received. The crate never looks inside.
#[derive(Clone, PartialEq)]
pub enum SnapshotPayload {
    /// base64 text carried in a `snapshot` text frame
    Encoded(String),
    /// bytes carried in a binary frame
    Raw(Vec<u8>),
}

impl SnapshotPayload {
    pub fn len(&self) -> usize {
        match self {
            SnapshotPayload::Encoded(data) => data.len(),
            SnapshotPayload::Raw(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Payloads can be hundreds of kilobytes, keep them out of the logs.
impl fmt::Debug for SnapshotPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotPayload::Encoded(data) => write!(f, "Encoded({} bytes)", data.len()),
            SnapshotPayload::Raw(data) => write!(f, "Raw({} bytes)", data.len()),
        }
    }
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// The device accepted this client; carries the current battery reading
    Ready(BatteryLevel),
    /// Someone else is already connected
    Busy,
    Battery(BatteryLevel),
    Snapshot(SnapshotPayload),
}

impl InboundFrame {
    pub fn tag(&self) -> &'static str {
        match self {
            InboundFrame::Ready(_) => TAG_READY,
            InboundFrame::Busy => TAG_BUSY,
            InboundFrame::Battery(_) => TAG_BATTERY,
            InboundFrame::Snapshot(_) => TAG_SNAPSHOT,
        }
    }
}
