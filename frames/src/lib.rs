//! Wire frame model and protobuf codec for the chat WebSocket transport.
//!
//! Every message between a chat client and the backend is a [`Frame`]. Clients
//! send `Request` frames; the backend answers with `Done`/`Error` frames that
//! carry the request id in `parent_id`, and broadcasts `Done` frames for
//! events other clients caused. Payloads stay flexible (`serde_json::Value`)
//! and are carried as a protobuf `Value` on the wire.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The `status` integer on the wire does not map to a known [`Status`] variant.
    #[error("invalid frame status: {0}")]
    InvalidStatus(i32),
}

/// Lifecycle status of a frame in a request/response exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Frame sent by a client asking for something to happen.
    Request,
    /// Intermediate streaming item (non-terminal).
    Item,
    /// Successful terminal response, or a broadcast of an accepted change.
    Done,
    /// Error terminal response.
    Error,
    /// Cancellation frame.
    Cancel,
}

impl Status {
    /// Convert status into wire enum integer value.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        let wire = match self {
            Self::Request => WireFrameStatus::Request,
            Self::Item => WireFrameStatus::Item,
            Self::Done => WireFrameStatus::Done,
            Self::Error => WireFrameStatus::Error,
            Self::Cancel => WireFrameStatus::Cancel,
        };
        wire as i32
    }

    fn from_i32(value: i32) -> Result<Self, CodecError> {
        match WireFrameStatus::try_from(value) {
            Ok(WireFrameStatus::Request) => Ok(Self::Request),
            Ok(WireFrameStatus::Item) => Ok(Self::Item),
            Ok(WireFrameStatus::Done) => Ok(Self::Done),
            Ok(WireFrameStatus::Error) => Ok(Self::Error),
            Ok(WireFrameStatus::Cancel) => Ok(Self::Cancel),
            Err(_) => Err(CodecError::InvalidStatus(value)),
        }
    }
}

/// A single message on the realtime wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// ID of the request frame this is responding to, if any.
    pub parent_id: Option<String>,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Chat room the frame is scoped to, if any.
    pub room: Option<String>,
    /// Sender identifier (display name or system label).
    pub from: Option<String>,
    /// Namespaced operation name, e.g. `"chat:message"`.
    pub syscall: String,
    /// Lifecycle position of the frame.
    pub status: Status,
    /// Arbitrary JSON payload.
    pub data: Value,
}

impl Frame {
    /// Build a fresh request frame with a new id and the current timestamp.
    #[must_use]
    pub fn request(syscall: impl Into<String>, room: Option<&str>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            ts: now_ms(),
            room: room.map(str::to_owned),
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Human-readable error text carried by an error frame.
    ///
    /// Prefers `data.message`, then `data.error`.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.data
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| self.data.get("error").and_then(Value::as_str))
    }
}

/// Current time as milliseconds since the Unix epoch; `0` if the clock is
/// before the epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire: WireFrame = frame.into();

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot hit `BufferTooSmall`, the only
    // error prost reports here.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::InvalidStatus`] for out-of-range status values.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    Frame::try_from(wire)
}

impl From<&Frame> for WireFrame {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id.clone(),
            parent_id: frame.parent_id.clone(),
            ts: frame.ts,
            room: frame.room.clone(),
            from: frame.from.clone(),
            syscall: frame.syscall.clone(),
            status: frame.status.as_i32(),
            data: Some(json_to_proto(&frame.data)),
        }
    }
}

impl TryFrom<WireFrame> for Frame {
    type Error = CodecError;

    fn try_from(wire: WireFrame) -> Result<Self, Self::Error> {
        Ok(Self {
            id: wire.id,
            parent_id: wire.parent_id,
            ts: wire.ts,
            room: wire.room,
            from: wire.from,
            syscall: wire.syscall,
            status: Status::from_i32(wire.status)?,
            data: wire
                .data
                .map_or(Value::Object(Map::new()), |v| proto_to_json(&v)),
        })
    }
}

fn json_to_proto(value: &Value) -> prost_types::Value {
    use prost_types::value::Kind;

    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => Kind::BoolValue(*v),
        Value::Number(v) => Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => Kind::StringValue(v.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(json_to_proto).collect(),
        }),
        Value::Object(fields) => Kind::StructValue(prost_types::Struct {
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json(value: &prost_types::Value) -> Value {
    use prost_types::value::Kind;

    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::NumberValue(v)) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(v)) => Value::String(v.clone()),
        Some(Kind::BoolValue(v)) => Value::Bool(*v),
        Some(Kind::StructValue(v)) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json(v)))
                .collect(),
        ),
        Some(Kind::ListValue(v)) => Value::Array(v.values.iter().map(proto_to_json).collect()),
    }
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(string, optional, tag = "2")]
    parent_id: Option<String>,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(string, optional, tag = "4")]
    room: Option<String>,
    #[prost(string, optional, tag = "5")]
    from: Option<String>,
    #[prost(string, tag = "6")]
    syscall: String,
    #[prost(enumeration = "WireFrameStatus", tag = "7")]
    status: i32,
    #[prost(message, optional, tag = "8")]
    data: Option<prost_types::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireFrameStatus {
    Request = 0,
    Done = 1,
    Error = 2,
    Cancel = 3,
    Item = 4,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
