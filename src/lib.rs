//! Realtime chat client core.
//!
//! ARCHITECTURE
//! ============
//! ```text
//! IdentityResolver ─▶ SessionController ─▶ ChannelAdapter ─▶ backend
//!                          │      ▲               │
//!                          ▼      └─ Subscription ◀┘
//!                      MessageLog
//! ```
//!
//! - [`store`]: ordered message log with id/index references
//! - [`avatar`]: deterministic sender color and initial
//! - [`channel`]: event taxonomy, adapter trait, in-memory hub, WebSocket transport
//! - [`identity`]: identity resolvers and the login redirect boundary
//! - [`session`]: lifecycle state machine and user actions
//! - [`config`]: environment-driven client configuration

pub mod avatar;
pub mod channel;
pub mod config;
pub mod identity;
pub mod message;
pub mod session;
pub mod store;

pub use channel::{ChannelAdapter, ChannelError, InboundEvent, OutboundEvent, Subscription};
pub use config::{ClientConfig, ConfigError};
pub use identity::{Identity, IdentityError, IdentityResolver, LoginRedirect};
pub use message::{MessageId, MessageRecord, Reference};
pub use session::{SendOutcome, SessionController, SessionError, SessionState, SessionView};
pub use store::{MessageLog, StoreError};
