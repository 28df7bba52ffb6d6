//! Fehlertypen für das Dekodieren eingehender Frames

use thiserror::Error;

/// Reasons an inbound frame could not be turned into an [`InboundFrame`].
///
/// Decode errors are never fatal: the session logs them and drops the frame.
///
/// [`InboundFrame`]: super::InboundFrame
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The text is not JSON at all
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON array")]
    NotAnArray,

    #[error("frame is an empty array")]
    EmptyFrame,

    #[error("frame tag is not a string")]
    TagNotString,

    /// Arguments may only be strings or numbers
    #[error("argument {index} of '{tag}' is neither a string nor a number")]
    UnsupportedArgument { tag: String, index: usize },

    #[error("unknown tag '{0}'")]
    UnknownTag(String),

    #[error("'{tag}' requires an argument")]
    MissingArgument { tag: &'static str },

    #[error("invalid argument for '{tag}': {reason}")]
    InvalidArgument { tag: &'static str, reason: String },
}
