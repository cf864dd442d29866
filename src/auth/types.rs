//! Token and session state types

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Kind of access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Sent as `Authorization: Bearer <token>`
    #[default]
    Bearer,
}

/// An access token owned by the session manager.
///
/// Tokens are handed out as clones; there is no way to mutate the one the
/// session holds.
#[derive(Clone)]
pub struct Token {
    value: SecretString,
    kind: TokenKind,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    scope: Option<String>,
    serial: u64,
}

impl Token {
    pub(crate) fn new(
        value: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        scope: Option<String>,
        serial: u64,
    ) -> Self {
        Self {
            value: SecretString::from(value),
            kind: TokenKind::Bearer,
            issued_at,
            expires_at,
            scope,
            serial,
        }
    }

    /// The token value
    pub fn secret(&self) -> &SecretString {
        &self.value
    }

    /// Token kind
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// When the token was obtained
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Absolute expiry instant
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Granted scope, if reported
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Monotonic sequence number assigned by the session that minted it
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Total lifetime from issue to expiry
    pub fn lifetime(&self) -> Duration {
        (self.expires_at - self.issued_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Lifetime left at `now`
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Check expiry at `now`, treating the last `skew` of lifetime as expired
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.remaining(now) <= skew
    }

    pub(crate) fn bearer_header(&self) -> Result<HeaderValue> {
        let mut value =
            HeaderValue::from_str(&format!("Bearer {}", self.value.expose_secret()))
                .map_err(|_| Error::unauthorized("token contains invalid header characters"))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
            && self.expires_at == other.expires_at
            && self.value.expose_secret() == other.value.expose_secret()
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("kind", &self.kind)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("serial", &self.serial)
            .finish()
    }
}

/// Public view of the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No token has been requested yet
    Unauthenticated,
    /// A token is held (it may have expired since)
    Valid,
    /// A refresh is running; callers wait for it
    RefreshInFlight,
    /// The token was discarded; the next call refreshes
    Invalidated,
}

/// Result of a keep-alive tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveOutcome {
    /// A new token was obtained
    Refreshed,
    /// The current token had enough lifetime left
    StillFresh,
}
