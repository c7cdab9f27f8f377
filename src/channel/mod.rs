//! Realtime channel boundary: event taxonomy, adapter trait, subscriptions.
//!
//! ARCHITECTURE
//! ============
//! An adapter owns a [`SubscriberRegistry`]. Each [`Subscription`] holds the
//! receiving half of an unbounded mpsc channel registered there; the adapter
//! publishes every decoded inbound event to all live subscriptions in
//! delivery order. Dropping a subscription unregisters it, so a torn-down
//! session can never observe another event.
//!
//! Adapters:
//! - [`memory`]: in-process chat room, used as the test fake and offline mode
//! - [`ws`]: WebSocket transport speaking the `frames` protocol
//! - [`wire`]: event ⇄ frame mapping shared by the WebSocket side

pub mod memory;
pub mod wire;
pub mod ws;


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::message::{MessageRecord, Reference};

/// Events the server pushes to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// Authoritative full history; replaces the log.
    History(Vec<MessageRecord>),
    MessageAppended(MessageRecord),
    MessageUpdated { reference: Reference, text: String },
    MessageDeleted(Reference),
    /// The transport (re)established its connection. Anything not yet
    /// confirmed is stale and history must be requested again.
    Reconnected,
}

/// Events the client asks the server to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundEvent {
    RequestHistory,
    SendMessage(MessageRecord),
    UpdateMessage { reference: Reference, text: String },
    DeleteMessage(Reference),
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("ws ticket unavailable: {0}")]
    Ticket(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}

/// Bidirectional event transport between the client core and the backend.
#[async_trait::async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Register a new receiver of inbound events.
    fn subscribe(&self) -> Subscription;

    /// Hand one outbound event to the transport.
    async fn emit(&self, event: OutboundEvent) -> Result<(), ChannelError>;
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

type Subscriber = (u64, mpsc::UnboundedSender<InboundEvent>);

/// Live subscriptions of one adapter.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SubscriberRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push((id, tx));
        Subscription { id, events: rx, registry: Arc::downgrade(self) }
    }

    /// Deliver an event to every live subscription; closed ones are pruned.
    /// Returns how many subscriptions received it.
    pub fn publish(&self, event: &InboundEvent) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|(_, tx)| !tx.is_closed());
        subscribers.len()
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().retain(|(sid, _)| *sid != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped receiver of inbound events. Unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event; `None` once the adapter is gone.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.events.close();
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}
