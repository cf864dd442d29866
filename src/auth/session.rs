//! Session manager
//!
//! Owns the current access token and serializes refreshes.
//!
//! Lifecycle: `Unauthenticated -> RefreshInFlight -> Valid`, then
//! `Valid -> Invalidated -> RefreshInFlight -> Valid` on every invalidate.
//! A failed or cancelled refresh leaves the session `Invalidated`, so the
//! next caller starts a new one instead of seeing a cached failure.
//!
//! All state lives behind one mutex that is never held across an await.
//! The first caller to find no usable token becomes the leader and runs the
//! refresh; everyone arriving while it runs subscribes to a watch channel
//! and receives the leader's result.

use super::exchange::{Grant, TokenEndpoint};
use super::types::{KeepAliveOutcome, SessionState, Token};
use crate::config::{AuthMode, Credentials, SessionConfig};
use crate::error::{Error, Result};
use crate::http::Transport;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Outcome = Option<Result<Token>>;

enum Slot {
    Unauthenticated,
    Valid(Token),
    RefreshInFlight(watch::Receiver<Outcome>),
    Invalidated,
}

enum RefreshMode {
    /// Obtain a brand new token with the credentials
    Fetch,
    /// Extend the given token through the keep-alive endpoint
    Extend(Token),
}

enum Step {
    Ready(Token),
    Follow(watch::Receiver<Outcome>),
    Lead(watch::Sender<Outcome>, RefreshMode),
}

/// Resets an abandoned refresh to `Invalidated`
struct RefreshGuard<'a> {
    slot: &'a Mutex<Slot>,
    armed: bool,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::RefreshInFlight(_)) {
                *slot = Slot::Invalidated;
            }
            debug!("Token refresh abandoned, session invalidated");
        }
    }
}

/// Owns the access token for one client
pub struct SessionManager {
    credentials: Credentials,
    config: SessionConfig,
    endpoint: TokenEndpoint,
    slot: Mutex<Slot>,
    serial: AtomicU64,
    refreshes: AtomicU64,
}

impl SessionManager {
    /// Create a session with no token
    pub fn new(
        credentials: Credentials,
        config: SessionConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let endpoint = TokenEndpoint::new(credentials.instance_url().clone(), transport);
        Self {
            credentials,
            config,
            endpoint,
            slot: Mutex::new(Slot::Unauthenticated),
            serial: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        match &*self.slot.lock() {
            Slot::Unauthenticated => SessionState::Unauthenticated,
            Slot::Valid(_) => SessionState::Valid,
            Slot::RefreshInFlight(_) => SessionState::RefreshInFlight,
            Slot::Invalidated => SessionState::Invalidated,
        }
    }

    /// Number of token endpoint calls made so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Return a usable token, refreshing if there is none, it has expired,
    /// or it was invalidated.
    pub async fn ensure_valid(&self) -> Result<Token> {
        self.ensure_valid_with(&CancellationToken::new()).await
    }

    /// [`ensure_valid`](Self::ensure_valid) with a cancellation signal
    pub async fn ensure_valid_with(&self, cancel: &CancellationToken) -> Result<Token> {
        self.drive(false, cancel).await.map(|(token, _)| token)
    }

    /// Refresh if the token's remaining lifetime is under the configured
    /// margin; otherwise do nothing. Safe to call from a timer.
    pub async fn keep_alive(&self) -> Result<KeepAliveOutcome> {
        self.keep_alive_with(&CancellationToken::new()).await
    }

    /// [`keep_alive`](Self::keep_alive) with a cancellation signal
    pub async fn keep_alive_with(&self, cancel: &CancellationToken) -> Result<KeepAliveOutcome> {
        let (_, refreshed) = self.drive(true, cancel).await?;
        Ok(if refreshed {
            KeepAliveOutcome::Refreshed
        } else {
            KeepAliveOutcome::StillFresh
        })
    }

    /// Discard the current token. A refresh already in flight is left alone,
    /// since it will produce a fresh token anyway.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        match *slot {
            Slot::RefreshInFlight(_) => {
                debug!("Invalidate requested during refresh, ignoring");
            }
            _ => {
                *slot = Slot::Invalidated;
                info!("Access token invalidated");
            }
        }
    }

    /// Discard `token` only if it is still the current one
    pub fn invalidate_if_current(&self, token: &Token) -> bool {
        let mut slot = self.slot.lock();
        if let Slot::Valid(current) = &*slot {
            if current.serial() == token.serial() {
                *slot = Slot::Invalidated;
                info!(serial = token.serial(), "Access token invalidated");
                return true;
            }
        }
        false
    }

    /// Revoke the current token on the server, then invalidate locally
    pub async fn revoke(&self) -> Result<()> {
        let current = match &*self.slot.lock() {
            Slot::Valid(token) => Some(token.clone()),
            _ => None,
        };
        if let Some(token) = current {
            self.endpoint.invalidate(&token).await?;
            self.invalidate_if_current(&token);
            info!("Access token revoked");
        }
        Ok(())
    }

    /// Run [`keep_alive`](Self::keep_alive) every `interval` until `cancel`
    /// fires. Failures are logged and retried on the next tick.
    pub fn spawn_keep_alive(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match session.keep_alive_with(&cancel).await {
                    Ok(outcome) => debug!(?outcome, "Keep-alive tick"),
                    Err(e) if e.is_cancelled() => break,
                    Err(e) => warn!("Keep-alive failed: {}", e),
                }
            }
            debug!("Keep-alive task stopped");
        })
    }

    async fn drive(&self, proactive: bool, cancel: &CancellationToken) -> Result<(Token, bool)> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.plan(proactive) {
                Step::Ready(token) => return Ok((token, false)),
                Step::Lead(tx, mode) => {
                    return self.lead(tx, mode, cancel).await.map(|t| (t, true));
                }
                Step::Follow(mut rx) => {
                    let wait = async { rx.wait_for(Option::is_some).await.map(|v| v.clone()) };
                    let outcome = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(Error::Cancelled),
                        outcome = wait => outcome,
                    };
                    match outcome {
                        Ok(Some(result)) => return result.map(|t| (t, true)),
                        // Leader went away without publishing; try again
                        _ => continue,
                    }
                }
            }
        }
    }

    fn plan(&self, proactive: bool) -> Step {
        let mut slot = self.slot.lock();
        let mode = match &*slot {
            Slot::RefreshInFlight(rx) => return Step::Follow(rx.clone()),
            Slot::Valid(token) => {
                let now = Utc::now();
                let expired = token.is_expired_at(now, self.config.expiry_skew);
                let margin = self.config.refresh_margin.for_lifetime(token.lifetime());
                if !expired && (!proactive || token.remaining(now) > margin) {
                    return Step::Ready(token.clone());
                }
                let extend = proactive
                    && !expired
                    && self.config.use_keep_alive_endpoint
                    && matches!(self.credentials.auth(), AuthMode::Basic { .. });
                if extend {
                    RefreshMode::Extend(token.clone())
                } else {
                    RefreshMode::Fetch
                }
            }
            Slot::Unauthenticated | Slot::Invalidated => RefreshMode::Fetch,
        };
        let (tx, rx) = watch::channel(None);
        *slot = Slot::RefreshInFlight(rx);
        Step::Lead(tx, mode)
    }

    async fn lead(
        &self,
        tx: watch::Sender<Outcome>,
        mode: RefreshMode,
        cancel: &CancellationToken,
    ) -> Result<Token> {
        let mut guard = RefreshGuard {
            slot: &self.slot,
            armed: true,
        };

        let grant = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            grant = self.obtain(mode) => grant,
        };
        guard.armed = false;

        let result = grant.map(|g| self.mint(g));
        {
            let mut slot = self.slot.lock();
            *slot = match &result {
                Ok(token) => Slot::Valid(token.clone()),
                Err(_) => Slot::Invalidated,
            };
        }

        match &result {
            Ok(token) => info!(
                auth_method = self.credentials.auth().name(),
                expires_at = %token.expires_at(),
                serial = token.serial(),
                "Access token refreshed"
            ),
            Err(e) => warn!(
                auth_method = self.credentials.auth().name(),
                "Token refresh failed: {}",
                e
            ),
        }

        tx.send_replace(Some(result.clone()));
        result
    }

    async fn obtain(&self, mode: RefreshMode) -> Result<Grant> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        match mode {
            RefreshMode::Fetch => self.endpoint.fetch(self.credentials.auth()).await,
            RefreshMode::Extend(token) => match self.endpoint.keep_alive(&token).await {
                Ok(grant) => Ok(grant),
                Err(e) => {
                    warn!("Keep-alive endpoint failed ({}), fetching a new token", e);
                    self.refreshes.fetch_add(1, Ordering::SeqCst);
                    self.endpoint.fetch(self.credentials.auth()).await
                }
            },
        }
    }

    fn mint(&self, grant: Grant) -> Token {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        Token::new(
            grant.value,
            grant.issued_at,
            grant.expires_at,
            grant.scope,
            serial,
        )
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("instance", &self.credentials.instance_domain())
            .field("auth_method", &self.credentials.auth().name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
