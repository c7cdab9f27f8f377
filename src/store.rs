//! Ordered in-memory message log for one chat session.
//!
//! DESIGN
//! ======
//! The log is the only owner of message records. Order is client arrival
//! order: new messages go to the tail, updates rewrite `text` in place and
//! deletes remove one entry without reordering the rest.
//!
//! ERROR HANDLING
//! ==============
//! `update_at`/`remove_at` treat an unresolvable reference as a no-op so a
//! late or duplicated event never takes the view down. The `try_*` variants
//! return [`StoreError::ReferenceNotFound`] for callers that need the signal.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::HashSet;

use tracing::debug;

use crate::channel::InboundEvent;
use crate::message::{MessageId, MessageRecord, Reference};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("message not found: {0}")]
    ReferenceNotFound(Reference),
}

/// Canonical ordered view of the messages in the active session.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    records: Vec<MessageRecord>,
    /// Ids present in `records`, for constant-time duplicate checks on append.
    ids: HashSet<MessageId>,
    /// Bumped on every effective mutation.
    rev: u64,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    /// Owned copy of the current sequence for renderers that outlive the borrow.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.records.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn rev(&self) -> u64 {
        self.rev
    }

    /// Position of the record a reference points at, if any.
    #[must_use]
    pub fn resolve(&self, reference: &Reference) -> Option<usize> {
        match reference {
            Reference::Id(id) => self
                .records
                .iter()
                .position(|record| record.id.as_ref() == Some(id)),
            Reference::Index(index) => (*index < self.records.len()).then_some(*index),
        }
    }

    #[must_use]
    pub fn get(&self, reference: &Reference) -> Option<&MessageRecord> {
        self.resolve(reference).map(|index| &self.records[index])
    }

    /// Position and record a reference points at.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReferenceNotFound`] if the reference does not resolve.
    pub fn locate(&self, reference: &Reference) -> Result<(usize, &MessageRecord), StoreError> {
        self.resolve(reference)
            .map(|index| (index, &self.records[index]))
            .ok_or_else(|| StoreError::ReferenceNotFound(reference.clone()))
    }

    /// Best reference for the record at `index`: its id when it has one,
    /// otherwise the position itself.
    #[must_use]
    pub fn reference_at(&self, index: usize) -> Option<Reference> {
        let record = self.records.get(index)?;
        Some(match &record.id {
            Some(id) => Reference::Id(id.clone()),
            None => Reference::Index(index),
        })
    }

    /// Replace the whole sequence with a history snapshot.
    pub fn replace_all(&mut self, records: Vec<MessageRecord>) {
        if self.records == records {
            return;
        }
        self.ids = records.iter().filter_map(|record| record.id.clone()).collect();
        self.records = records;
        self.bump();
    }

    /// Add a record at the tail.
    ///
    /// Returns `false` when a record with the same id is already present;
    /// a twice-delivered echo must not duplicate the message.
    pub fn append(&mut self, record: MessageRecord) -> bool {
        if let Some(id) = &record.id {
            if !self.ids.insert(id.clone()) {
                debug!(%id, "store: duplicate append dropped");
                return false;
            }
        }
        self.records.push(record);
        self.bump();
        true
    }

    /// Replace the text of the referenced record; every other field and the
    /// record's position stay as they are.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReferenceNotFound`] if the reference does not resolve.
    pub fn try_update_at(&mut self, reference: &Reference, text: &str) -> Result<(), StoreError> {
        let index = self
            .resolve(reference)
            .ok_or_else(|| StoreError::ReferenceNotFound(reference.clone()))?;
        let record = &mut self.records[index];
        if record.text != text {
            record.text = text.to_owned();
            self.bump();
        }
        Ok(())
    }

    /// Lenient [`Self::try_update_at`]: returns whether the reference resolved.
    pub fn update_at(&mut self, reference: &Reference, text: &str) -> bool {
        match self.try_update_at(reference, text) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "store: update skipped");
                false
            }
        }
    }

    /// Remove exactly one record; later positions shift down by one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReferenceNotFound`] if the reference does not resolve.
    pub fn try_remove_at(&mut self, reference: &Reference) -> Result<MessageRecord, StoreError> {
        let index = self
            .resolve(reference)
            .ok_or_else(|| StoreError::ReferenceNotFound(reference.clone()))?;
        let removed = self.records.remove(index);
        if let Some(id) = &removed.id {
            // A history snapshot may carry the same id twice; keep it indexed
            // while any copy remains.
            if !self.records.iter().any(|record| record.id.as_ref() == Some(id)) {
                self.ids.remove(id);
            }
        }
        self.bump();
        Ok(removed)
    }

    /// Lenient [`Self::try_remove_at`].
    pub fn remove_at(&mut self, reference: &Reference) -> Option<MessageRecord> {
        match self.try_remove_at(reference) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "store: remove skipped");
                None
            }
        }
    }

    /// Apply one inbound channel event. Returns whether the log changed.
    pub fn apply(&mut self, event: InboundEvent) -> bool {
        let before = self.rev;
        match event {
            InboundEvent::History(records) => self.replace_all(records),
            InboundEvent::MessageAppended(record) => {
                self.append(record);
            }
            InboundEvent::MessageUpdated { reference, text } => {
                self.update_at(&reference, &text);
            }
            InboundEvent::MessageDeleted(reference) => {
                self.remove_at(&reference);
            }
            InboundEvent::Reconnected => {}
        }
        self.rev != before
    }

    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            self.records.clear();
            self.ids.clear();
            self.bump();
        }
    }

    fn bump(&mut self) {
        self.rev = self.rev.wrapping_add(1);
    }
}
