//! In-process chat room.
//!
//! DESIGN
//! ======
//! `MemoryHub` plays the backend: it keeps the server-side log, applies each
//! outbound event in the order it arrives and decides who hears about it.
//! History requests are answered to the requester only; accepted changes are
//! broadcast to every connected channel, sender included, so every client
//! converges on the server-observed order.
//!
//! Used as the fake adapter in tests and as the offline mode of the CLI.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use super::{ChannelAdapter, ChannelError, InboundEvent, OutboundEvent, SubscriberRegistry, Subscription};
use crate::message::{MessageId, MessageRecord};
use crate::store::MessageLog;

/// Who receives the result of an outbound event.
enum Outcome {
    /// Every connected channel, sender included.
    Broadcast(InboundEvent),
    /// The sender only.
    Reply(InboundEvent),
    /// Nothing changed; nobody hears about it.
    Dropped,
}

#[derive(Default)]
struct HubState {
    log: MessageLog,
    peers: Vec<Weak<SubscriberRegistry>>,
    received: Vec<OutboundEvent>,
    offline: bool,
}

/// Shared server-side state of one in-memory room.
#[derive(Default)]
pub struct MemoryHub {
    state: Mutex<HubState>,
}

impl MemoryHub {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hub whose server-side log starts with `records`.
    #[must_use]
    pub fn with_history(records: Vec<MessageRecord>) -> Arc<Self> {
        let hub = Self::new();
        hub.lock().log.replace_all(records);
        hub
    }

    /// Open a new client connection to this room.
    #[must_use]
    pub fn connect(self: &Arc<Self>) -> MemoryChannel {
        let registry = SubscriberRegistry::new();
        self.lock().peers.push(Arc::downgrade(&registry));
        MemoryChannel { hub: Arc::clone(self), registry }
    }

    /// Server-side log as the backend currently sees it.
    #[must_use]
    pub fn history(&self) -> Vec<MessageRecord> {
        self.lock().log.snapshot()
    }

    /// Every outbound event accepted so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<OutboundEvent> {
        self.lock().received.clone()
    }

    /// While offline, every `emit` fails with [`ChannelError::Closed`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Push a server-originated event to every connected channel without
    /// touching the server-side log.
    pub fn inject(&self, event: &InboundEvent) {
        let state = self.lock();
        broadcast(&state.peers, event);
    }

    /// Simulate a transport drop followed by a reconnect on every channel.
    pub fn bounce_connections(&self) {
        self.inject(&InboundEvent::Reconnected);
    }

    fn handle(&self, from: &Arc<SubscriberRegistry>, event: OutboundEvent) -> Result<(), ChannelError> {
        let mut state = self.lock();
        if state.offline {
            return Err(ChannelError::Closed);
        }
        state.received.push(event.clone());
        state.peers.retain(|peer| peer.strong_count() > 0);

        match apply_outbound(&mut state.log, event) {
            Outcome::Broadcast(inbound) => broadcast(&state.peers, &inbound),
            Outcome::Reply(inbound) => {
                from.publish(&inbound);
            }
            Outcome::Dropped => {}
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_outbound(log: &mut MessageLog, event: OutboundEvent) -> Outcome {
    match event {
        OutboundEvent::RequestHistory => Outcome::Reply(InboundEvent::History(log.snapshot())),
        OutboundEvent::SendMessage(mut record) => {
            if record.id.is_none() {
                record.id = Some(MessageId::generate());
            }
            if log.append(record.clone()) {
                Outcome::Broadcast(InboundEvent::MessageAppended(record))
            } else {
                Outcome::Dropped
            }
        }
        OutboundEvent::UpdateMessage { reference, text } => {
            if log.update_at(&reference, &text) {
                Outcome::Broadcast(InboundEvent::MessageUpdated { reference, text })
            } else {
                debug!(%reference, "hub: update for unknown message ignored");
                Outcome::Dropped
            }
        }
        OutboundEvent::DeleteMessage(reference) => {
            if log.remove_at(&reference).is_some() {
                Outcome::Broadcast(InboundEvent::MessageDeleted(reference))
            } else {
                debug!(%reference, "hub: delete for unknown message ignored");
                Outcome::Dropped
            }
        }
    }
}

fn broadcast(peers: &[Weak<SubscriberRegistry>], event: &InboundEvent) {
    for peer in peers.iter().filter_map(Weak::upgrade) {
        peer.publish(event);
    }
}

/// One client connection to a [`MemoryHub`].
pub struct MemoryChannel {
    hub: Arc<MemoryHub>,
    registry: Arc<SubscriberRegistry>,
}

impl MemoryChannel {
    /// Live subscriptions on this connection.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for MemoryChannel {
    fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }

    async fn emit(&self, event: OutboundEvent) -> Result<(), ChannelError> {
        self.hub.handle(&self.registry, event)
    }
}
