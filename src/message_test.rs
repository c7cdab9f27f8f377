use super::*;
use time::macros::datetime;

#[test]
fn compose_stamps_id_color_and_time() {
    let record = MessageRecord::compose("Alice", "hello");
    assert!(record.id.is_some());
    assert_eq!(record.sender, "Alice");
    assert_eq!(record.text, "hello");
    assert_eq!(record.avatar_color, "#00B894");
    assert_eq!(record.sent_at.len(), 5);
    assert_eq!(record.sent_at.as_bytes()[2], b':');
}

#[test]
fn compose_generates_distinct_ids() {
    let a = MessageRecord::compose("Alice", "one");
    let b = MessageRecord::compose("Alice", "one");
    assert_ne!(a.id, b.id);
}

#[test]
fn format_sent_at_is_zero_padded_hours_and_minutes() {
    assert_eq!(format_sent_at(datetime!(2024-03-01 09:05 UTC)), "09:05");
    assert_eq!(format_sent_at(datetime!(2024-03-01 23:59:59 UTC)), "23:59");
}

#[test]
fn deserialize_accepts_legacy_keys() {
    let record: MessageRecord = serde_json::from_value(serde_json::json!({
        "sender": "Bob",
        "text": "yo",
        "avatarColor": "#4ECDC4",
        "time": "10:30"
    }))
    .expect("legacy record should parse");
    assert_eq!(record.id, None);
    assert_eq!(record.avatar_color, "#4ECDC4");
    assert_eq!(record.sent_at, "10:30");
}

#[test]
fn deserialize_derives_missing_color_from_sender() {
    let record: MessageRecord = serde_json::from_value(serde_json::json!({
        "id": "m1",
        "sender": "Alice",
        "text": "hi"
    }))
    .expect("record should parse");
    assert_eq!(record.id, Some(MessageId::from("m1")));
    assert_eq!(record.avatar_color, "#00B894");
    assert_eq!(record.sent_at, "");
}

#[test]
fn deserialize_treats_empty_id_as_missing() {
    let record: MessageRecord =
        serde_json::from_value(serde_json::json!({"id": "", "sender": "A", "text": "t"})).expect("parse");
    assert!(record.id.is_none());
}

#[test]
fn deserialize_requires_sender_and_text() {
    assert!(serde_json::from_value::<MessageRecord>(serde_json::json!({"sender": "A"})).is_err());
    assert!(serde_json::from_value::<MessageRecord>(serde_json::json!({"text": "t"})).is_err());
}

#[test]
fn serialize_uses_current_field_names() {
    let record = MessageRecord {
        id: Some(MessageId::from("m1")),
        sender: "A".to_owned(),
        text: "t".to_owned(),
        avatar_color: "#FF6B6B".to_owned(),
        sent_at: "12:00".to_owned(),
    };
    let value = serde_json::to_value(&record).expect("serialize");
    assert_eq!(
        value,
        serde_json::json!({"id": "m1", "sender": "A", "text": "t", "avatar_color": "#FF6B6B", "sent_at": "12:00"})
    );
}

#[test]
fn reference_display_names_its_kind() {
    assert_eq!(Reference::from(MessageId::from("m1")).to_string(), "id:m1");
    assert_eq!(Reference::from(3_usize).to_string(), "index:3");
}

#[test]
fn numeric_ids_read_back_as_integer_strings() {
    let from_int: MessageId = serde_json::from_value(serde_json::json!(7)).expect("int id");
    let from_float: MessageId = serde_json::from_value(serde_json::json!(7.0)).expect("float id");
    let from_text: MessageId = serde_json::from_value(serde_json::json!("7")).expect("text id");
    assert_eq!(from_int, from_text);
    assert_eq!(from_float, from_text);
}
