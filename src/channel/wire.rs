//! Mapping between channel events and wire frames.
//!
//! PROTOCOL
//! ========
//! | Syscall        | Client → server (`request`)      | Server → client (`done`)          |
//! |----------------|----------------------------------|-----------------------------------|
//! | `chat:history` | `{}`                             | `{messages: [record…]}`           |
//! | `chat:message` | `record`                         | `record` (with server id)         |
//! | `chat:update`  | `{id \| index, text}`            | `{id \| index, text}`             |
//! | `chat:delete`  | `{id \| index}`                  | `{id \| index}`                   |
//!
//! Only `done` frames become inbound events. Malformed payloads are skipped
//! rather than surfaced; the stream keeps flowing.

#[cfg(test)]
#[path = "wire_test.rs"]
mod wire_test;

use frames::{Frame, Status};
use serde_json::{Map, Value};

use super::{ChannelError, InboundEvent, OutboundEvent};
use crate::message::{MessageId, MessageRecord, Reference};

pub const SYSCALL_HISTORY: &str = "chat:history";
pub const SYSCALL_MESSAGE: &str = "chat:message";
pub const SYSCALL_UPDATE: &str = "chat:update";
pub const SYSCALL_DELETE: &str = "chat:delete";
pub const SYSCALL_SESSION_CONNECTED: &str = "session:connected";
pub const SYSCALL_ROOM_JOIN: &str = "room:join";

/// Request frame for an outbound event, scoped to `room`.
///
/// # Errors
///
/// Returns [`ChannelError::InvalidPayload`] if a record fails to serialize.
pub fn outbound_frame(event: &OutboundEvent, room: &str) -> Result<Frame, ChannelError> {
    let (syscall, data) = match event {
        OutboundEvent::RequestHistory => (SYSCALL_HISTORY, Value::Object(Map::new())),
        OutboundEvent::SendMessage(record) => (SYSCALL_MESSAGE, serde_json::to_value(record)?),
        OutboundEvent::UpdateMessage { reference, text } => {
            let mut data = reference_fields(reference);
            data.insert("text".to_owned(), Value::String(text.clone()));
            (SYSCALL_UPDATE, Value::Object(data))
        }
        OutboundEvent::DeleteMessage(reference) => (SYSCALL_DELETE, Value::Object(reference_fields(reference))),
    };
    Ok(Frame::request(syscall, Some(room), data))
}

/// Request frame joining `room`; sent once per connection.
#[must_use]
pub fn join_frame(room: &str) -> Frame {
    Frame::request(SYSCALL_ROOM_JOIN, Some(room), Value::Object(Map::new()))
}

/// Inbound event carried by a frame, if any.
///
/// Frames scoped to a different room, non-`done` frames and unknown
/// syscalls yield `None`.
#[must_use]
pub fn inbound_event(frame: &Frame, room: &str) -> Option<InboundEvent> {
    if frame.status != Status::Done {
        return None;
    }
    if frame.room.as_deref().is_some_and(|r| r != room) {
        return None;
    }

    match frame.syscall.as_str() {
        SYSCALL_HISTORY => {
            let items = frame.data.get("messages")?.as_array()?;
            Some(InboundEvent::History(items.iter().filter_map(parse_record).collect()))
        }
        SYSCALL_MESSAGE => parse_record(&frame.data).map(InboundEvent::MessageAppended),
        SYSCALL_UPDATE => {
            let reference = parse_reference(&frame.data)?;
            let text = frame.data.get("text")?.as_str()?.to_owned();
            Some(InboundEvent::MessageUpdated { reference, text })
        }
        SYSCALL_DELETE => parse_reference(&frame.data).map(InboundEvent::MessageDeleted),
        _ => None,
    }
}

fn parse_record(value: &Value) -> Option<MessageRecord> {
    serde_json::from_value(value.clone()).ok()
}

fn reference_fields(reference: &Reference) -> Map<String, Value> {
    let mut data = Map::new();
    match reference {
        Reference::Id(id) => {
            data.insert("id".to_owned(), Value::String(id.as_str().to_owned()));
        }
        Reference::Index(index) => {
            data.insert("index".to_owned(), Value::from(*index));
        }
    }
    data
}

/// `id` wins over `index`. Numbers may arrive as floats after the protobuf
/// round trip, so integral floats are accepted for both.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
pub(crate) fn parse_reference(data: &Value) -> Option<Reference> {
    if let Some(id) = data.get("id").filter(|v| !v.is_null()) {
        let id: MessageId = serde_json::from_value(id.clone()).ok()?;
        if id.as_str().is_empty() {
            return None;
        }
        return Some(Reference::Id(id));
    }

    let index = data.get("index")?;
    let index = index.as_u64().or_else(|| {
        index
            .as_f64()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= 9.0e15)
            .map(|n| n as u64)
    })?;
    usize::try_from(index).ok().map(Reference::Index)
}
