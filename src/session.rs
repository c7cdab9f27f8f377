//! Session controller: identity gate, channel subscription and user actions.
//!
//! LIFECYCLE
//! =========
//! ```text
//! Unauthenticated ──start──▶ Resolving ──identity──▶ Active ──logout──▶ Terminated
//!        ▲                       │                      │
//!        └──── none / failure ───┘◀──── identity lost ──┘
//! ```
//!
//! While `Active` the controller owns the message log and the channel
//! [`Subscription`]. Both live inside the active session and are dropped
//! together on every exit path, so a stale subscription can never touch a
//! discarded log. All mutation goes through `&mut self`.
//!
//! The server echo is authoritative: sends and edits are emitted and the log
//! changes only when the resulting inbound event arrives.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::{ChannelAdapter, ChannelError, InboundEvent, OutboundEvent, Subscription};
use crate::identity::{Identity, IdentityError, IdentityResolver, LoginRedirect};
use crate::message::{MessageId, MessageRecord, Reference};
use crate::store::{MessageLog, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active session")]
    NotActive,
    #[error("message {0} belongs to someone else")]
    NotOwner(Reference),
    #[error("message not found: {0}")]
    ReferenceNotFound(Reference),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl From<StoreError> for SessionError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ReferenceNotFound(reference) => Self::ReferenceNotFound(reference),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Resolving,
    Active,
    Terminated,
}

/// Result of [`SessionController::send`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// A new message went out with this id.
    Sent(MessageId),
    /// The pending edit target was updated.
    Updated(Reference),
    /// The composer was blank; nothing was emitted.
    Ignored,
}

/// Read-only snapshot for renderers.
#[derive(Clone, Copy, Debug)]
pub struct SessionView<'a> {
    pub records: &'a [MessageRecord],
    pub display_name: &'a str,
    pub composer: &'a str,
    pub pending_edit: Option<&'a Reference>,
    pub unconfirmed: usize,
    pub rev: u64,
}

struct ActiveSession {
    identity: Identity,
    log: MessageLog,
    subscription: Subscription,
    composer: String,
    pending_edit: Option<Reference>,
    /// Ids of sent messages whose echo has not arrived yet.
    unconfirmed: HashSet<MessageId>,
}

enum Phase {
    Unauthenticated,
    Resolving,
    Active(Box<ActiveSession>),
    Terminated,
}

pub struct SessionController {
    identity: Arc<dyn IdentityResolver>,
    channel: Arc<dyn ChannelAdapter>,
    redirect: Arc<dyn LoginRedirect>,
    phase: Phase,
}

impl SessionController {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        channel: Arc<dyn ChannelAdapter>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self { identity, channel, redirect, phase: Phase::Unauthenticated }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Unauthenticated => SessionState::Unauthenticated,
            Phase::Resolving => SessionState::Resolving,
            Phase::Active(_) => SessionState::Active,
            Phase::Terminated => SessionState::Terminated,
        }
    }

    /// Resolve the identity and, if there is one, enter `Active`.
    ///
    /// No identity or a failed lookup ends in `Unauthenticated` with a login
    /// redirect rather than an error.
    pub async fn start(&mut self) -> SessionState {
        if matches!(self.phase, Phase::Active(_)) {
            return SessionState::Active;
        }
        self.phase = Phase::Resolving;

        match self.identity.current_identity().await {
            Ok(Some(identity)) => self.activate(identity).await,
            Ok(None) => self.unauthenticated("not signed in"),
            Err(e) => {
                warn!(error = %e, "session: identity lookup failed");
                self.unauthenticated("identity lookup failed");
            }
        }
        self.state()
    }

    /// React to a change reported by the identity resolver.
    pub async fn handle_identity_change(&mut self, identity: Option<Identity>) -> SessionState {
        let current = match &self.phase {
            Phase::Active(active) => Some(active.identity.clone()),
            _ => None,
        };

        match (current, identity) {
            (Some(_), None) => {
                info!("session: identity lost");
                self.teardown();
                self.unauthenticated("signed out elsewhere");
            }
            (Some(current), Some(identity)) if current != identity => {
                info!(display_name = %identity.display_name, "session: identity switched");
                self.teardown();
                self.activate(identity).await;
            }
            (None, Some(_)) => {
                return self.start().await;
            }
            _ => {}
        }
        self.state()
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Replace the composer text.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotActive`] outside `Active`.
    pub fn compose(&mut self, text: &str) -> Result<(), SessionError> {
        let active = self.active_mut()?;
        text.clone_into(&mut active.composer);
        Ok(())
    }

    /// Emit the composer: an update when an edit is pending, a new message
    /// otherwise. Blank text is ignored.
    ///
    /// On failure the composer and pending edit are left as they were.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotActive`] outside `Active`,
    /// [`SessionError::ReferenceNotFound`] if the edit target has vanished,
    /// or the channel error if the emit fails.
    pub async fn send(&mut self) -> Result<SendOutcome, SessionError> {
        let channel = Arc::clone(&self.channel);
        let active = self.active_mut()?;
        if active.composer.trim().is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        if let Some(target) = active.pending_edit.clone() {
            active.log.locate(&target)?;
            channel
                .emit(OutboundEvent::UpdateMessage { reference: target.clone(), text: active.composer.clone() })
                .await?;
            active.pending_edit = None;
            active.composer.clear();
            debug!(%target, "session: edit sent");
            return Ok(SendOutcome::Updated(target));
        }

        let record = MessageRecord::compose(&active.identity.display_name, &active.composer);
        let id = record.id.clone().unwrap_or_else(MessageId::generate);
        channel.emit(OutboundEvent::SendMessage(record)).await?;
        active.unconfirmed.insert(id.clone());
        active.composer.clear();
        debug!(%id, "session: message sent");
        Ok(SendOutcome::Sent(id))
    }

    /// Load one of the local user's messages into the composer and make it
    /// the edit target, replacing any earlier target.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ReferenceNotFound`] for an unknown reference,
    /// [`SessionError::NotOwner`] for someone else's message.
    pub fn begin_edit(&mut self, reference: &Reference) -> Result<(), SessionError> {
        let active = self.active_mut()?;
        let target = active.owned_reference(reference)?;
        let text = active.log.locate(&target)?.1.text.clone();
        active.composer = text;
        active.pending_edit = Some(target);
        Ok(())
    }

    /// Drop the edit target and empty the composer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotActive`] outside `Active`.
    pub fn cancel_edit(&mut self) -> Result<(), SessionError> {
        let active = self.active_mut()?;
        active.pending_edit = None;
        active.composer.clear();
        Ok(())
    }

    /// Ask the server to delete one of the local user's messages.
    ///
    /// # Errors
    ///
    /// Same as [`Self::begin_edit`], plus the channel error if the emit fails.
    pub async fn delete(&mut self, reference: &Reference) -> Result<(), SessionError> {
        let channel = Arc::clone(&self.channel);
        let active = self.active_mut()?;
        let target = active.owned_reference(reference)?;
        channel.emit(OutboundEvent::DeleteMessage(target.clone())).await?;
        if active.pending_edit.as_ref() == Some(&target) {
            active.pending_edit = None;
            active.composer.clear();
        }
        debug!(%target, "session: delete sent");
        Ok(())
    }

    /// Tear the session down, sign out and redirect to login.
    ///
    /// The session is torn down even when sign-out fails.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotActive`] outside `Active`, or the sign-out
    /// failure after teardown.
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        self.active_mut()?;
        self.teardown();
        self.phase = Phase::Terminated;

        let signed_out = self.identity.sign_out().await;
        if let Err(e) = &signed_out {
            warn!(error = %e, "session: sign-out failed");
        }
        info!("session: logged out");
        self.redirect.redirect_to_login("logged out");
        signed_out.map_err(SessionError::from)
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Wait for the next inbound event and apply it.
    ///
    /// Returns `Ok(None)` once the channel has gone away.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotActive`] outside `Active`.
    pub async fn next_event(&mut self) -> Result<Option<InboundEvent>, SessionError> {
        let active = self.active_mut()?;
        let Some(event) = active.subscription.recv().await else {
            return Ok(None);
        };
        self.apply(event.clone()).await;
        Ok(Some(event))
    }

    /// Apply every event already queued, without waiting. Returns how many
    /// were applied.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotActive`] outside `Active`.
    pub async fn drain_events(&mut self) -> Result<usize, SessionError> {
        let mut applied = 0;
        loop {
            let Some(event) = self.active_mut()?.subscription.try_recv() else {
                return Ok(applied);
            };
            self.apply(event).await;
            applied += 1;
        }
    }

    #[must_use]
    pub fn view(&self) -> Option<SessionView<'_>> {
        let Phase::Active(active) = &self.phase else {
            return None;
        };
        Some(SessionView {
            records: active.log.records(),
            display_name: &active.identity.display_name,
            composer: &active.composer,
            pending_edit: active.pending_edit.as_ref(),
            unconfirmed: active.unconfirmed.len(),
            rev: active.log.rev(),
        })
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn activate(&mut self, identity: Identity) {
        info!(display_name = %identity.display_name, "session: active");
        let subscription = self.channel.subscribe();
        self.phase = Phase::Active(Box::new(ActiveSession {
            identity,
            log: MessageLog::new(),
            subscription,
            composer: String::new(),
            pending_edit: None,
            unconfirmed: HashSet::new(),
        }));
        self.request_history().await;
    }

    async fn apply(&mut self, event: InboundEvent) {
        let Phase::Active(active) = &mut self.phase else {
            return;
        };

        match event {
            InboundEvent::Reconnected => {
                if !active.unconfirmed.is_empty() {
                    info!(dropped = active.unconfirmed.len(), "session: discarding unconfirmed sends");
                }
                active.unconfirmed.clear();
                self.request_history().await;
                return;
            }
            InboundEvent::MessageAppended(ref record) => {
                if let Some(id) = &record.id {
                    active.unconfirmed.remove(id);
                }
            }
            InboundEvent::History(ref records) => {
                for id in records.iter().filter_map(|r| r.id.as_ref()) {
                    active.unconfirmed.remove(id);
                }
            }
            InboundEvent::MessageUpdated { .. } | InboundEvent::MessageDeleted(_) => {}
        }

        active.log.apply(event);

        if let Some(target) = &active.pending_edit {
            if active.log.resolve(target).is_none() {
                info!(%target, "session: edit target removed");
                active.pending_edit = None;
                active.composer.clear();
            }
        }
    }

    async fn request_history(&self) {
        if let Err(e) = self.channel.emit(OutboundEvent::RequestHistory).await {
            warn!(error = %e, "session: history request failed; waiting for reconnect");
        }
    }

    fn teardown(&mut self) {
        // Dropping the session drops the subscription and unregisters it.
        if let Phase::Active(mut active) = std::mem::replace(&mut self.phase, Phase::Unauthenticated) {
            debug!(subscription = active.subscription.id(), records = active.log.len(), "session: torn down");
            active.log.clear();
        }
    }

    fn unauthenticated(&mut self, reason: &str) {
        self.phase = Phase::Unauthenticated;
        self.redirect.redirect_to_login(reason);
    }

    fn active_mut(&mut self) -> Result<&mut ActiveSession, SessionError> {
        match &mut self.phase {
            Phase::Active(active) => Ok(active),
            _ => Err(SessionError::NotActive),
        }
    }
}

impl ActiveSession {
    /// Stable reference to a record the local user wrote.
    fn owned_reference(&self, reference: &Reference) -> Result<Reference, SessionError> {
        let (index, record) = self.log.locate(reference)?;
        if !record.is_from(&self.identity.display_name) {
            return Err(SessionError::NotOwner(reference.clone()));
        }
        self.log
            .reference_at(index)
            .ok_or_else(|| SessionError::ReferenceNotFound(reference.clone()))
    }
}
