//! Transport seam of the control session.
//!
//! The session never touches sockets directly. It asks a [`Connector`] for a
//! fresh [`Transport`] on every connection attempt and receives the link's
//! activity back as [`LinkEvent`]s tagged with the [`LinkId`] the connector was
//! given. The production connector lives in [`super::websocket`]; tests plug in
//! in-memory fakes.

use crate::protocol::WireFrame;
use std::fmt;

/// Identity of one transport handle. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that happened on a link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The socket is open; the device has not said anything yet
    Opened,
    Frame(WireFrame),
    Closed,
    Error(String),
}

impl LinkEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LinkEvent::Opened => "open",
            LinkEvent::Frame(_) => "frame",
            LinkEvent::Closed => "close",
            LinkEvent::Error(_) => "error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("link {0} is already closed")]
    Closed(LinkId),

    #[error("failed to send on link {link}: {reason}")]
    SendFailed { link: LinkId, reason: String },
}

/// Outbound half of one live link.
pub trait Transport {
    fn send_text(&mut self, frame: String) -> Result<(), TransportError>;

    /// Starts closing the link. The link still reports [`LinkEvent::Closed`]
    /// once it is gone.
    fn close(&mut self);
}

/// Opens new links. Implementations deliver the link's events to the session
/// owner out of band.
pub trait Connector {
    type Transport: Transport;

    fn open(&mut self, link: LinkId) -> Self::Transport;
}
