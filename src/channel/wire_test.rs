use super::*;

fn done(syscall: &str, room: Option<&str>, data: Value) -> Frame {
    Frame {
        id: "f1".to_owned(),
        parent_id: None,
        ts: 42,
        room: room.map(str::to_owned),
        from: Some("server".to_owned()),
        syscall: syscall.to_owned(),
        status: Status::Done,
        data,
    }
}

fn record(id: &str, sender: &str, text: &str) -> MessageRecord {
    MessageRecord {
        id: Some(MessageId::from(id)),
        sender: sender.to_owned(),
        text: text.to_owned(),
        avatar_color: "#4ECDC4".to_owned(),
        sent_at: "08:15".to_owned(),
    }
}

// =============================================================
// outbound
// =============================================================

#[test]
fn request_history_is_empty_request() {
    let frame = outbound_frame(&OutboundEvent::RequestHistory, "lobby").expect("frame");
    assert_eq!(frame.syscall, SYSCALL_HISTORY);
    assert_eq!(frame.status, Status::Request);
    assert_eq!(frame.room.as_deref(), Some("lobby"));
    assert_eq!(frame.data, serde_json::json!({}));
}

#[test]
fn send_message_carries_the_record() {
    let frame = outbound_frame(&OutboundEvent::SendMessage(record("m1", "A", "hi")), "lobby").expect("frame");
    assert_eq!(frame.syscall, SYSCALL_MESSAGE);
    assert_eq!(
        frame.data,
        serde_json::json!({"id": "m1", "sender": "A", "text": "hi", "avatar_color": "#4ECDC4", "sent_at": "08:15"})
    );
}

#[test]
fn update_and_delete_encode_reference() {
    let update = OutboundEvent::UpdateMessage {
        reference: Reference::Id(MessageId::from("m1")),
        text: "new".to_owned(),
    };
    let frame = outbound_frame(&update, "lobby").expect("frame");
    assert_eq!(frame.syscall, SYSCALL_UPDATE);
    assert_eq!(frame.data, serde_json::json!({"id": "m1", "text": "new"}));

    let frame = outbound_frame(&OutboundEvent::DeleteMessage(Reference::Index(3)), "lobby").expect("frame");
    assert_eq!(frame.syscall, SYSCALL_DELETE);
    assert_eq!(frame.data, serde_json::json!({"index": 3}));
}

#[test]
fn join_frame_targets_room() {
    let frame = join_frame("ops");
    assert_eq!(frame.syscall, SYSCALL_ROOM_JOIN);
    assert_eq!(frame.room.as_deref(), Some("ops"));
}

// =============================================================
// inbound
// =============================================================

#[test]
fn history_parses_valid_items_and_skips_invalid() {
    let frame = done(
        SYSCALL_HISTORY,
        Some("lobby"),
        serde_json::json!({
            "messages": [
                {"id": "m1", "sender": "A", "text": "one", "avatar_color": "#4ECDC4", "sent_at": "08:15"},
                {"id": "m2", "sender": "B"}
            ]
        }),
    );
    assert_eq!(inbound_event(&frame, "lobby"), Some(InboundEvent::History(vec![record("m1", "A", "one")])));
}

#[test]
fn history_requires_messages_field() {
    let frame = done(SYSCALL_HISTORY, None, serde_json::json!({}));
    assert_eq!(inbound_event(&frame, "lobby"), None);
}

#[test]
fn message_frame_becomes_appended_event() {
    let frame = done(
        SYSCALL_MESSAGE,
        Some("lobby"),
        serde_json::json!({"id": "m1", "sender": "A", "text": "one", "avatar_color": "#4ECDC4", "sent_at": "08:15"}),
    );
    assert_eq!(inbound_event(&frame, "lobby"), Some(InboundEvent::MessageAppended(record("m1", "A", "one"))));
}

#[test]
fn update_frame_parses_id_and_text() {
    let frame = done(SYSCALL_UPDATE, None, serde_json::json!({"id": "m1", "text": "edited"}));
    assert_eq!(
        inbound_event(&frame, "lobby"),
        Some(InboundEvent::MessageUpdated { reference: Reference::Id(MessageId::from("m1")), text: "edited".to_owned() })
    );
}

#[test]
fn update_frame_without_text_is_skipped() {
    let frame = done(SYSCALL_UPDATE, None, serde_json::json!({"id": "m1"}));
    assert_eq!(inbound_event(&frame, "lobby"), None);
}

#[test]
fn delete_frame_accepts_float_index_after_codec_round_trip() {
    let frame = done(SYSCALL_DELETE, None, serde_json::json!({"index": 2}));
    let decoded = frames::decode_frame(&frames::encode_frame(&frame)).expect("decode");
    assert_eq!(inbound_event(&decoded, "lobby"), Some(InboundEvent::MessageDeleted(Reference::Index(2))));
}

#[test]
fn non_done_and_foreign_room_frames_are_ignored() {
    let mut frame = done(SYSCALL_DELETE, Some("lobby"), serde_json::json!({"id": "m1"}));
    frame.status = Status::Request;
    assert_eq!(inbound_event(&frame, "lobby"), None);

    let frame = done(SYSCALL_DELETE, Some("other"), serde_json::json!({"id": "m1"}));
    assert_eq!(inbound_event(&frame, "lobby"), None);

    let frame = done("presence:ping", Some("lobby"), serde_json::json!({}));
    assert_eq!(inbound_event(&frame, "lobby"), None);
}

// =============================================================
// references
// =============================================================

#[test]
fn parse_reference_prefers_id_over_index() {
    let data = serde_json::json!({"id": "m1", "index": 0});
    assert_eq!(parse_reference(&data), Some(Reference::Id(MessageId::from("m1"))));
}

#[test]
fn parse_reference_accepts_numeric_id() {
    let data = serde_json::json!({"id": 1.0});
    assert_eq!(parse_reference(&data), Some(Reference::Id(MessageId::from("1"))));
}

#[test]
fn parse_reference_rejects_negative_or_fractional_index() {
    assert_eq!(parse_reference(&serde_json::json!({"index": -1})), None);
    assert_eq!(parse_reference(&serde_json::json!({"index": 1.5})), None);
    assert_eq!(parse_reference(&serde_json::json!({"id": ""})), None);
    assert_eq!(parse_reference(&serde_json::json!({})), None);
}
