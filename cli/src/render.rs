//! Plain-text rendering of the session view.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use chatsync::avatar::avatar_initial;
use chatsync::{InboundEvent, MessageRecord, SessionView};

/// One transcript line: `  2 [09:41] (A) Alice: hi`. The local user's own
/// messages show as `You`.
pub fn render_record(position: usize, record: &MessageRecord, display_name: &str) -> String {
    let sender = if record.is_from(display_name) { "You" } else { record.sender.as_str() };
    let time = if record.sent_at.is_empty() { "--:--" } else { record.sent_at.as_str() };
    format!("{position:>3} [{time}] ({}) {sender}: {}", avatar_initial(&record.sender), record.text)
}

/// Every record, numbered from 1.
pub fn render_transcript(view: &SessionView<'_>) -> Vec<String> {
    if view.records.is_empty() {
        return vec!["(no messages yet)".to_owned()];
    }
    view.records
        .iter()
        .enumerate()
        .map(|(index, record)| render_record(index + 1, record, view.display_name))
        .collect()
}

/// Edit prompt, when an edit is pending.
pub fn render_status(view: &SessionView<'_>) -> Option<String> {
    view.pending_edit.map(|target| format!("editing {target}; enter the new text or /cancel"))
}

/// Lines to print after an inbound event was applied. Events that left the
/// log unchanged (a duplicate echo, a stale delete) print nothing.
pub fn render_event(view: &SessionView<'_>, event: &InboundEvent, previous_rev: u64) -> Vec<String> {
    if let InboundEvent::Reconnected = event {
        return vec!["(connected; syncing history)".to_owned()];
    }
    if view.rev == previous_rev {
        return Vec::new();
    }
    if let InboundEvent::MessageAppended(_) = event {
        return view
            .records
            .last()
            .map(|record| render_record(view.records.len(), record, view.display_name))
            .into_iter()
            .collect();
    }
    let mut lines = render_transcript(view);
    lines.extend(render_status(view));
    lines
}
