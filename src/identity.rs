//! Identity resolution and the login redirect boundary.
//!
//! The session controller never authenticates anyone itself. It asks an
//! [`IdentityResolver`] for the current display name, watches it for changes,
//! and hands control to a [`LoginRedirect`] when there is no identity.

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::channel::ChannelError;
use crate::channel::ws::TicketSource;

/// The signed-in user as far as the chat is concerned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub display_name: String,
}

impl Identity {
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self { display_name: display_name.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("identity provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
}

/// Supplies the current identity and notifies on changes.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` means nobody is signed in.
    async fn current_identity(&self) -> Result<Option<Identity>, IdentityError>;

    /// Receiver that observes every identity change from now on.
    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Sends the user somewhere they can sign in.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, reason: &str);
}

// =============================================================================
// STATIC
// =============================================================================

/// Locally supplied display name; the anonymous/offline mode.
pub struct StaticIdentity {
    changes: watch::Sender<Option<Identity>>,
}

impl StaticIdentity {
    #[must_use]
    pub fn new(identity: Option<Identity>) -> Self {
        let (changes, _) = watch::channel(identity);
        Self { changes }
    }

    #[must_use]
    pub fn named(display_name: impl Into<String>) -> Self {
        Self::new(Some(Identity::new(display_name)))
    }

    /// Replace the identity and notify watchers.
    pub fn set(&self, identity: Option<Identity>) {
        self.changes.send_replace(identity);
    }
}

#[async_trait::async_trait]
impl IdentityResolver for StaticIdentity {
    async fn current_identity(&self) -> Result<Option<Identity>, IdentityError> {
        Ok(self.changes.borrow().clone())
    }

    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.set(None);
        Ok(())
    }
}

// =============================================================================
// HTTP
// =============================================================================

#[derive(Deserialize)]
struct CurrentUser {
    name: String,
}

/// Identity backed by the server's session cookie.
///
/// `GET /api/auth/me` resolves the user, `POST /api/auth/logout` ends the
/// session and `POST /api/auth/ws-ticket` mints WebSocket tickets.
pub struct HttpIdentityResolver {
    base_url: String,
    client: reqwest::Client,
    changes: watch::Sender<Option<Identity>>,
}

impl HttpIdentityResolver {
    /// # Errors
    ///
    /// Returns an error if the session token is not a valid header value or
    /// the HTTP client cannot be built.
    pub fn new(base_url: &str, session_token: Option<&str>) -> Result<Self, IdentityError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = session_token {
            headers.insert(COOKIE, HeaderValue::from_str(&format!("session_token={token}"))?);
        }
        let client = reqwest::Client::builder().default_headers(headers).build()?;
        let (changes, _) = watch::channel(None);
        Ok(Self { base_url: base_url.trim_end_matches('/').to_owned(), client, changes })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn fetch_ticket(&self) -> Result<String, IdentityError> {
        let response = self.client.post(self.url("/api/auth/ws-ticket")).send().await?;
        let body = json_body(response).await?;
        body.get("ticket")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or(IdentityError::MissingField("ticket"))
    }
}

async fn json_body(response: reqwest::Response) -> Result<Value, IdentityError> {
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(IdentityError::Status { status: status.as_u16(), body: value.to_string() });
    }
    Ok(value)
}

#[async_trait::async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn current_identity(&self) -> Result<Option<Identity>, IdentityError> {
        let response = self.client.get(self.url("/api/auth/me")).send().await?;
        let identity = if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            None
        } else {
            let body = json_body(response).await?;
            let user: CurrentUser =
                serde_json::from_value(body).map_err(|_| IdentityError::MissingField("name"))?;
            Some(Identity::new(user.name))
        };

        self.changes.send_if_modified(|current| {
            if *current == identity {
                return false;
            }
            current.clone_from(&identity);
            true
        });
        Ok(identity)
    }

    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let response = self.client.post(self.url("/api/auth/logout")).send().await?;
        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "identity: logout rejected");
        }
        self.changes.send_replace(None);
        info!("identity: signed out");
        Ok(())
    }
}

#[async_trait::async_trait]
impl TicketSource for HttpIdentityResolver {
    async fn ws_ticket(&self) -> Result<String, ChannelError> {
        self.fetch_ticket().await.map_err(|e| ChannelError::Ticket(e.to_string()))
    }
}
