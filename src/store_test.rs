use super::*;
use crate::message::MessageId;

fn record(id: &str, sender: &str, text: &str) -> MessageRecord {
    MessageRecord {
        id: Some(MessageId::from(id)),
        sender: sender.to_owned(),
        text: text.to_owned(),
        avatar_color: crate::avatar::avatar_color(sender).to_owned(),
        sent_at: "12:00".to_owned(),
    }
}

fn anonymous(sender: &str, text: &str) -> MessageRecord {
    MessageRecord { id: None, ..record("", sender, text) }
}

fn id_ref(id: &str) -> Reference {
    Reference::Id(MessageId::from(id))
}

fn texts(log: &MessageLog) -> Vec<(&str, &str)> {
    log.records()
        .iter()
        .map(|r| (r.sender.as_str(), r.text.as_str()))
        .collect()
}

// =============================================================
// append / replace_all
// =============================================================

#[test]
fn new_log_is_empty() {
    let log = MessageLog::new();
    assert!(log.is_empty());
    assert_eq!(log.len(), 0);
    assert_eq!(log.rev(), 0);
}

#[test]
fn history_then_append_keeps_arrival_order() {
    let mut log = MessageLog::new();
    log.replace_all(vec![record("1", "A", "hi")]);
    assert!(log.append(record("2", "B", "yo")));
    assert_eq!(texts(&log), vec![("A", "hi"), ("B", "yo")]);
}

#[test]
fn appends_preserve_call_order() {
    let mut log = MessageLog::new();
    for n in 0..20 {
        log.append(record(&n.to_string(), "A", &format!("m{n}")));
    }
    let expected: Vec<String> = (0..20).map(|n| format!("m{n}")).collect();
    let actual: Vec<String> = log.records().iter().map(|r| r.text.clone()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn append_drops_duplicate_id() {
    let mut log = MessageLog::new();
    assert!(log.append(record("1", "A", "hi")));
    let rev = log.rev();
    assert!(!log.append(record("1", "A", "hi again")));
    assert_eq!(log.len(), 1);
    assert_eq!(log.rev(), rev);
    assert_eq!(log.records()[0].text, "hi");
}

#[test]
fn removed_id_can_be_appended_again() {
    let mut log = MessageLog::new();
    log.append(record("1", "A", "hi"));
    log.append(record("2", "B", "yo"));
    assert!(log.remove_at(&id_ref("1")).is_some());

    assert!(log.append(record("1", "A", "back")));
    assert!(!log.append(record("1", "A", "twice")));
    assert!(!log.append(record("2", "B", "echo")));
    assert_eq!(texts(&log), vec![("B", "yo"), ("A", "back")]);
}

#[test]
fn replace_all_reindexes_ids() {
    let mut log = MessageLog::new();
    log.append(record("old", "A", "stale"));
    log.replace_all(vec![record("1", "B", "fresh")]);

    assert!(log.append(record("old", "A", "allowed again")));
    assert!(!log.append(record("1", "B", "duplicate")));
    assert_eq!(log.len(), 2);
}

#[test]
fn duplicate_ids_in_history_stay_indexed_until_last_copy_goes() {
    let mut log = MessageLog::new();
    log.replace_all(vec![record("1", "A", "first"), record("1", "A", "second")]);

    log.remove_at(&id_ref("1"));
    assert!(!log.append(record("1", "A", "still present")));

    log.remove_at(&id_ref("1"));
    assert!(log.is_empty());
    assert!(log.append(record("1", "A", "now new")));
}

#[test]
fn many_appends_stay_ordered() {
    let mut log = MessageLog::new();
    for n in 0..20_000 {
        assert!(log.append(record(&n.to_string(), "A", "x")));
    }
    assert_eq!(log.len(), 20_000);
    assert!(!log.append(record("19999", "A", "dup")));
    assert_eq!(log.records()[19_999].id, Some(MessageId::from("19999")));
}

#[test]
fn append_keeps_every_id_less_record() {
    let mut log = MessageLog::new();
    assert!(log.append(anonymous("A", "same")));
    assert!(log.append(anonymous("A", "same")));
    assert_eq!(log.len(), 2);
}

#[test]
fn replace_all_twice_equals_once() {
    let snapshot = vec![record("1", "A", "hi"), record("2", "B", "yo")];

    let mut once = MessageLog::new();
    once.replace_all(snapshot.clone());

    let mut twice = MessageLog::new();
    twice.replace_all(snapshot.clone());
    twice.replace_all(snapshot);

    assert_eq!(once.records(), twice.records());
    assert_eq!(once.rev(), twice.rev());
}

#[test]
fn replace_all_discards_previous_records() {
    let mut log = MessageLog::new();
    log.append(record("x", "A", "stale"));
    log.replace_all(vec![record("1", "B", "fresh")]);
    assert_eq!(texts(&log), vec![("B", "fresh")]);
}

// =============================================================
// update / remove
// =============================================================

#[test]
fn update_changes_only_text() {
    let mut log = MessageLog::new();
    log.replace_all(vec![record("1", "A", "hi"), record("2", "B", "yo")]);
    let before = log.records()[0].clone();

    assert!(log.update_at(&id_ref("1"), "hello"));

    let after = &log.records()[0];
    assert_eq!(after.text, "hello");
    assert_eq!(after.id, before.id);
    assert_eq!(after.sender, before.sender);
    assert_eq!(after.avatar_color, before.avatar_color);
    assert_eq!(after.sent_at, before.sent_at);
    assert_eq!(log.records()[1].text, "yo");
}

#[test]
fn update_with_same_text_does_not_bump_rev() {
    let mut log = MessageLog::new();
    log.append(record("1", "A", "hi"));
    let rev = log.rev();
    assert!(log.update_at(&id_ref("1"), "hi"));
    assert_eq!(log.rev(), rev);
}

#[test]
fn update_by_index_addresses_position() {
    let mut log = MessageLog::new();
    log.replace_all(vec![anonymous("A", "one"), anonymous("B", "two")]);
    assert!(log.update_at(&Reference::Index(1), "deux"));
    assert_eq!(texts(&log), vec![("A", "one"), ("B", "deux")]);
}

#[test]
fn unknown_references_leave_log_unchanged() {
    let mut log = MessageLog::new();
    log.replace_all(vec![record("1", "A", "hi")]);
    let before = log.snapshot();
    let rev = log.rev();

    assert!(!log.update_at(&id_ref("missing"), "x"));
    assert!(!log.update_at(&Reference::Index(5), "x"));
    assert!(log.remove_at(&id_ref("missing")).is_none());
    assert!(log.remove_at(&Reference::Index(1)).is_none());

    assert_eq!(log.records(), before.as_slice());
    assert_eq!(log.rev(), rev);
}

#[test]
fn strict_variants_report_missing_reference() {
    let mut log = MessageLog::new();
    let err = log.try_update_at(&id_ref("nope"), "x").expect_err("should miss");
    assert_eq!(err, StoreError::ReferenceNotFound(id_ref("nope")));
    let err = log.try_remove_at(&Reference::Index(0)).expect_err("should miss");
    assert_eq!(err, StoreError::ReferenceNotFound(Reference::Index(0)));
}

#[test]
fn remove_shifts_later_positions_down() {
    let mut log = MessageLog::new();
    log.replace_all(vec![anonymous("A", "one"), anonymous("B", "two"), anonymous("C", "three")]);

    let removed = log.remove_at(&Reference::Index(0)).expect("removed");
    assert_eq!(removed.text, "one");
    assert_eq!(log.get(&Reference::Index(0)).map(|r| r.text.as_str()), Some("two"));
    assert_eq!(log.get(&Reference::Index(1)).map(|r| r.text.as_str()), Some("three"));
}

#[test]
fn update_then_remove_equals_remove_alone() {
    let seed = vec![record("1", "A", "hi"), record("2", "B", "yo"), record("3", "C", "hey")];
    for reference in [id_ref("2"), Reference::Index(1), id_ref("missing"), Reference::Index(9)] {
        let mut updated = MessageLog::new();
        updated.replace_all(seed.clone());
        updated.update_at(&reference, "edited");
        updated.remove_at(&reference);

        let mut removed = MessageLog::new();
        removed.replace_all(seed.clone());
        removed.remove_at(&reference);

        assert_eq!(updated.records(), removed.records(), "{reference}");
    }
}

// =============================================================
// lookup helpers
// =============================================================

#[test]
fn reference_at_prefers_id_and_falls_back_to_index() {
    let mut log = MessageLog::new();
    log.replace_all(vec![record("1", "A", "hi"), anonymous("B", "yo")]);
    assert_eq!(log.reference_at(0), Some(id_ref("1")));
    assert_eq!(log.reference_at(1), Some(Reference::Index(1)));
    assert_eq!(log.reference_at(2), None);
}

#[test]
fn locate_returns_position_and_record() {
    let mut log = MessageLog::new();
    log.replace_all(vec![record("1", "A", "hi"), record("2", "B", "yo")]);
    let (index, found) = log.locate(&id_ref("2")).expect("found");
    assert_eq!(index, 1);
    assert_eq!(found.text, "yo");
    assert_eq!(log.locate(&Reference::Index(2)), Err(StoreError::ReferenceNotFound(Reference::Index(2))));
}

#[test]
fn clear_empties_log() {
    let mut log = MessageLog::new();
    log.append(record("1", "A", "hi"));
    log.clear();
    assert!(log.is_empty());
    assert!(log.append(record("1", "A", "hi")));
}

// =============================================================
// apply
// =============================================================

#[test]
fn apply_routes_each_event_kind() {
    let mut log = MessageLog::new();
    assert!(log.apply(InboundEvent::History(vec![record("1", "A", "hi")])));
    assert!(log.apply(InboundEvent::MessageAppended(record("2", "B", "yo"))));
    assert!(log.apply(InboundEvent::MessageUpdated { reference: id_ref("1"), text: "hello".to_owned() }));
    assert!(log.apply(InboundEvent::MessageDeleted(id_ref("2"))));
    assert!(!log.apply(InboundEvent::Reconnected));
    assert!(!log.apply(InboundEvent::MessageDeleted(id_ref("2"))));
    assert_eq!(texts(&log), vec![("A", "hello")]);
}
