//! Stateless encoder/decoder for control frames.
//!
//! Identical input always yields identical output; no function here looks at
//! session state. Whether a well-formed frame is acceptable *right now* is the
//! session's decision, not the codec's.

use super::{
    BatteryLevel, DecodeError, InboundFrame, SnapshotPayload, WireFrame, WireValue, TAG_BATTERY,
    TAG_BUSY, TAG_READY, TAG_SNAPSHOT,
};
use serde_json::Value;

/// Serializes a tag and its positional arguments into one text frame.
///
/// The frame is a JSON array terminated by `\n`. Numbers that JSON cannot
/// represent (NaN, infinities) are written as `null`.
pub fn encode(tag: &str, args: &[WireValue]) -> String {
    let mut fields = Vec::with_capacity(args.len() + 1);
    fields.push(Value::String(tag.to_string()));
    for arg in args {
        fields.push(match arg {
            WireValue::Text(text) => Value::String(text.clone()),
            WireValue::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        });
    }

    let mut frame = Value::Array(fields).to_string();
    frame.push('\n');
    frame
}

/// Splits a text frame into its tag and residual arguments.
///
/// Inverse of [`encode`]. Surrounding whitespace, including the trailing line
/// break, is ignored.
pub fn split_frame(text: &str) -> Result<(String, Vec<WireValue>), DecodeError> {
    let value: Value = serde_json::from_str(text.trim())?;

    let Value::Array(fields) = value else {
        return Err(DecodeError::NotAnArray);
    };

    let mut fields = fields.into_iter();
    let tag = match fields.next() {
        Some(Value::String(tag)) => tag,
        Some(_) => return Err(DecodeError::TagNotString),
        None => return Err(DecodeError::EmptyFrame),
    };

    let mut args = Vec::new();
    for (index, field) in fields.enumerate() {
        match field {
            Value::String(text) => args.push(WireValue::Text(text)),
            Value::Number(number) => match number.as_f64() {
                Some(number) => args.push(WireValue::Number(number)),
                None => return Err(DecodeError::UnsupportedArgument { tag, index }),
            },
            _ => return Err(DecodeError::UnsupportedArgument { tag, index }),
        }
    }

    Ok((tag, args))
}

/// Decodes a transport frame into a typed [`InboundFrame`].
///
/// Binary frames bypass text parsing and are always snapshot payloads.
pub fn decode(frame: WireFrame) -> Result<InboundFrame, DecodeError> {
    let text = match frame {
        WireFrame::Binary(bytes) => return Ok(InboundFrame::Snapshot(SnapshotPayload::Raw(bytes))),
        WireFrame::Text(text) => text,
    };

    let (tag, mut args) = split_frame(&text)?;

    match tag.as_str() {
        TAG_READY => {
            let level = battery_argument(TAG_READY, args.first())?;
            Ok(InboundFrame::Ready(level))
        }
        TAG_BUSY => Ok(InboundFrame::Busy),
        TAG_BATTERY => {
            let level = battery_argument(TAG_BATTERY, args.first())?;
            Ok(InboundFrame::Battery(level))
        }
        TAG_SNAPSHOT => {
            if args.is_empty() {
                return Err(DecodeError::MissingArgument { tag: TAG_SNAPSHOT });
            }
            match args.swap_remove(0) {
                WireValue::Text(data) => Ok(InboundFrame::Snapshot(SnapshotPayload::Encoded(data))),
                WireValue::Number(_) => Err(DecodeError::InvalidArgument {
                    tag: TAG_SNAPSHOT,
                    reason: "payload must be a string".to_string(),
                }),
            }
        }
        _ => Err(DecodeError::UnknownTag(tag)),
    }
}

// The device reports battery readings as strings, older firmware as numbers.
fn battery_argument(
    tag: &'static str,
    arg: Option<&WireValue>,
) -> Result<BatteryLevel, DecodeError> {
    let raw = match arg {
        Some(WireValue::Number(number)) => *number,
        Some(WireValue::Text(text)) => {
            text.trim()
                .parse::<f64>()
                .map_err(|e| DecodeError::InvalidArgument {
                    tag,
                    reason: format!("'{}' is not a number: {}", text, e),
                })?
        }
        None => return Err(DecodeError::MissingArgument { tag }),
    };

    BatteryLevel::new(raw).ok_or_else(|| DecodeError::InvalidArgument {
        tag,
        reason: format!("{} is not a valid battery reading", raw),
    })
}
