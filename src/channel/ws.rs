//! WebSocket channel adapter over the `frames` protocol.
//!
//! LIFECYCLE
//! =========
//! A background task owns the socket:
//! 1. fetch a one-time ticket (if a [`TicketSource`] is configured) and connect
//! 2. wait for `session:connected`, then send `room:join`
//! 3. relay outbound frames and publish decoded inbound events
//! 4. on close/error, back off and go to 1
//!
//! After every successful connect the task publishes
//! [`InboundEvent::Reconnected`] so the session (re)requests history; a
//! request emitted before the first connect is therefore never lost. Emits fail
//! fast with [`ChannelError::Closed`] while the socket is down instead of
//! queueing behind a dead connection. Dropping [`WsChannel`] stops the task.

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use frames::{Frame, Status};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::wire::{self, SYSCALL_SESSION_CONNECTED};
use super::{ChannelAdapter, ChannelError, InboundEvent, OutboundEvent, SubscriberRegistry, Subscription};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SESSION_CONNECTED_TIMEOUT: Duration = Duration::from_secs(5);

/// Supplies the one-time ticket appended to the upgrade URL.
#[async_trait::async_trait]
pub trait TicketSource: Send + Sync {
    async fn ws_ticket(&self) -> Result<String, ChannelError>;
}

/// Exponential reconnect backoff: `min`, doubling per failed attempt, capped
/// at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub min: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { min: Duration::from_millis(1000), max: Duration::from_millis(10_000) }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based), without jitter.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.min.saturating_mul(factor).min(self.max)
    }

    /// [`Self::delay`] plus up to 25% random jitter so reconnecting clients
    /// spread out.
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        let spread = u64::try_from(base.as_millis() / 4).unwrap_or(u64::MAX);
        base + Duration::from_millis(rand::rng().random_range(0..=spread))
    }
}

/// Where and how to connect.
#[derive(Clone)]
pub struct WsOptions {
    /// `ws://` or `wss://` endpoint, without the ticket query.
    pub endpoint: String,
    pub room: String,
    pub reconnect: ReconnectPolicy,
    pub tickets: Option<Arc<dyn TicketSource>>,
}

impl WsOptions {
    fn url(&self, ticket: Option<&str>) -> String {
        match ticket {
            Some(ticket) => format!("{}?ticket={ticket}", self.endpoint),
            None => self.endpoint.clone(),
        }
    }
}

/// Channel adapter backed by a reconnecting WebSocket task.
pub struct WsChannel {
    room: String,
    registry: Arc<SubscriberRegistry>,
    outbound: mpsc::UnboundedSender<Frame>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WsChannel {
    /// Spawn the connection task on the current tokio runtime.
    #[must_use]
    pub fn spawn(options: WsOptions) -> Self {
        let registry = SubscriberRegistry::new();
        let connected = Arc::new(AtomicBool::new(false));
        let (outbound, rx) = mpsc::unbounded_channel();
        let room = options.room.clone();
        let task = tokio::spawn(connection_loop(options, Arc::clone(&registry), Arc::clone(&connected), rx));
        Self { room, registry, outbound, connected, task }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for WsChannel {
    fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }

    async fn emit(&self, event: OutboundEvent) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Closed);
        }
        let frame = wire::outbound_frame(&event, &self.room)?;
        self.outbound.send(frame).map_err(|_| ChannelError::Closed)
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

enum Exit {
    /// The socket went away; reconnect.
    Disconnected,
    /// The owning `WsChannel` is gone; stop.
    Shutdown,
}

async fn connection_loop(
    options: WsOptions,
    registry: Arc<SubscriberRegistry>,
    connected: Arc<AtomicBool>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = connect_and_run(&options, &registry, &connected, &mut outbound, &mut attempt).await;
        connected.store(false, Ordering::Release);

        match result {
            Ok(Exit::Shutdown) => {
                info!(room = %options.room, "ws: channel dropped, stopping");
                return;
            }
            Ok(Exit::Disconnected) => info!(room = %options.room, "ws: disconnected"),
            Err(e) => warn!(room = %options.room, error = %e, "ws: connection failed"),
        }

        let delay = options.reconnect.jittered_delay(attempt);
        attempt = attempt.saturating_add(1);
        debug!(delay_ms = delay.as_millis(), attempt, "ws: reconnecting after backoff");
        tokio::time::sleep(delay).await;
    }
}

async fn connect_and_run(
    options: &WsOptions,
    registry: &SubscriberRegistry,
    connected: &AtomicBool,
    outbound: &mut mpsc::UnboundedReceiver<Frame>,
    attempt: &mut u32,
) -> Result<Exit, ChannelError> {
    let ticket = match &options.tickets {
        Some(source) => Some(source.ws_ticket().await?),
        None => None,
    };

    let (mut stream, _) = connect_async(options.url(ticket.as_deref())).await?;
    wait_for_session_connected(&mut stream).await?;
    send_frame(&mut stream, &wire::join_frame(&options.room)).await?;

    // Frames queued against the previous socket were never confirmed.
    let mut stale = 0_usize;
    while outbound.try_recv().is_ok() {
        stale += 1;
    }
    if stale > 0 {
        debug!(stale, "ws: discarded frames queued before reconnect");
    }

    connected.store(true, Ordering::Release);
    *attempt = 0;
    info!(room = %options.room, "ws: connected");
    registry.publish(&InboundEvent::Reconnected);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = stream.close(None).await;
                    return Ok(Exit::Shutdown);
                };
                debug!(id = %frame.id, syscall = %frame.syscall, "ws: send frame");
                send_frame(&mut stream, &frame).await?;
            }
            message = stream.next() => {
                let Some(message) = message else {
                    return Ok(Exit::Disconnected);
                };
                match message? {
                    Message::Binary(bytes) => dispatch_bytes(&bytes, &options.room, registry),
                    Message::Close(_) => return Ok(Exit::Disconnected),
                    _ => {}
                }
            }
        }
    }
}

fn dispatch_bytes(bytes: &[u8], room: &str, registry: &SubscriberRegistry) {
    let frame = match frames::decode_frame(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "ws: invalid inbound frame");
            return;
        }
    };

    if frame.status == Status::Error {
        warn!(
            syscall = %frame.syscall,
            message = frame.error_message().unwrap_or("unknown websocket error"),
            "ws: recv error frame"
        );
        return;
    }

    match wire::inbound_event(&frame, room) {
        Some(event) => {
            registry.publish(&event);
        }
        None => debug!(syscall = %frame.syscall, status = ?frame.status, "ws: frame ignored"),
    }
}

async fn send_frame(stream: &mut WsStream, frame: &Frame) -> Result<(), ChannelError> {
    stream
        .send(Message::Binary(frames::encode_frame(frame).into()))
        .await?;
    Ok(())
}

async fn wait_for_session_connected(stream: &mut WsStream) -> Result<(), ChannelError> {
    let wait = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(ChannelError::Closed);
            };
            match message? {
                Message::Binary(bytes) => {
                    if frames::decode_frame(&bytes)?.syscall == SYSCALL_SESSION_CONNECTED {
                        return Ok(());
                    }
                }
                Message::Close(_) => return Err(ChannelError::Closed),
                _ => {}
            }
        }
    };

    tokio::time::timeout(SESSION_CONNECTED_TIMEOUT, wait)
        .await
        .map_err(|_| ChannelError::Closed)?
}
