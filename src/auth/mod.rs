//! Authentication module
//!
//! Supports: OAuth2 client credentials, basic (username/password) tokens
//!
//! The `SessionManager` owns the access token, refreshes it through the
//! Jamf Pro token endpoints, and guarantees at most one refresh runs at a
//! time no matter how many callers need a token concurrently.

mod exchange;
mod session;
mod types;

pub use session::SessionManager;
pub use types::{KeepAliveOutcome, SessionState, Token, TokenKind};

#[cfg(test)]
mod tests;
