//! Token endpoint calls
//!
//! Talks to the Jamf Pro auth endpoints directly through the transport.
//! These calls are never retried and never carry a session token of their
//! own, so they cannot recurse into the session manager.

use super::types::Token;
use crate::codec::{encode_form, parse_error_body};
use crate::config::AuthMode;
use crate::error::{default_message_for_status, Error, Result};
use crate::http::{Response, Transport, TransportBody, TransportRequest};
use crate::types::Method;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

pub(crate) const OAUTH_TOKEN_PATH: &str = "api/v1/oauth/token";
pub(crate) const BASIC_TOKEN_PATH: &str = "api/v1/auth/token";
pub(crate) const KEEP_ALIVE_PATH: &str = "api/v1/auth/keep-alive";
pub(crate) const INVALIDATE_PATH: &str = "api/v1/auth/invalidate-token";

/// A token as issued by the server, before the session numbers it
#[derive(Debug)]
pub(crate) struct Grant {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub scope: Option<String>,
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct BearerTokenResponse {
    token: String,
    expires: DateTime<Utc>,
}

pub(crate) struct TokenEndpoint {
    base_url: Url,
    transport: Arc<dyn Transport>,
}

impl TokenEndpoint {
    pub fn new(base_url: Url, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url,
            transport,
        }
    }

    /// Obtain a new token with the configured credentials
    pub async fn fetch(&self, auth: &AuthMode) -> Result<Grant> {
        let issued_at = Utc::now();
        match auth {
            AuthMode::TokenExchange {
                client_id,
                client_secret,
            } => {
                let body = encode_form([
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.expose_secret()),
                    ("grant_type", "client_credentials"),
                ]);
                let mut headers = HeaderMap::new();
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                let resp = self
                    .post(OAUTH_TOKEN_PATH, headers, TransportBody::Bytes(body))
                    .await?;
                let parsed: OAuthTokenResponse = parse_grant(resp)?;
                Ok(Grant {
                    value: parsed.access_token,
                    issued_at,
                    expires_at: issued_at + chrono::Duration::seconds(parsed.expires_in.max(0)),
                    scope: parsed.scope,
                })
            }
            AuthMode::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{}", password.expose_secret()));
                let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
                    .map_err(|_| Error::config("username contains invalid characters"))?;
                value.set_sensitive(true);
                let mut headers = HeaderMap::new();
                headers.insert(AUTHORIZATION, value);
                let resp = self
                    .post(BASIC_TOKEN_PATH, headers, TransportBody::Empty)
                    .await?;
                let parsed: BearerTokenResponse = parse_grant(resp)?;
                Ok(Grant {
                    value: parsed.token,
                    issued_at,
                    expires_at: parsed.expires,
                    scope: None,
                })
            }
        }
    }

    /// Exchange a still-valid bearer token for a fresh one
    pub async fn keep_alive(&self, token: &Token) -> Result<Grant> {
        let issued_at = Utc::now();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token.bearer_header()?);
        let resp = self
            .post(KEEP_ALIVE_PATH, headers, TransportBody::Empty)
            .await?;
        let parsed: BearerTokenResponse = parse_grant(resp)?;
        Ok(Grant {
            value: parsed.token,
            issued_at,
            expires_at: parsed.expires,
            scope: token.scope().map(str::to_string),
        })
    }

    /// Revoke a token on the server. A 401 means it is already unusable.
    pub async fn invalidate(&self, token: &Token) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token.bearer_header()?);
        match self
            .post(INVALIDATE_PATH, headers, TransportBody::Empty)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.status() == Some(401) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn post(&self, path: &str, mut headers: HeaderMap, body: TransportBody) -> Result<Response> {
        let url = self.base_url.join(path)?;
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let resp = self
            .transport
            .send(TransportRequest {
                method: Method::POST,
                url,
                headers,
                body,
                timeout: None,
            })
            .await?;

        if resp.is_success() {
            return Ok(resp);
        }

        let status = resp.status.as_u16();
        let parsed = parse_error_body(&resp.body);
        let message = parsed
            .message
            .unwrap_or_else(|| default_message_for_status(status).to_string());
        Err(Error::Unauthorized {
            code: parsed.code,
            message: format!("token request to {path} failed with {status}: {message}"),
            response: Some(Box::new(resp)),
        })
    }
}

fn parse_grant<T: DeserializeOwned>(resp: Response) -> Result<T> {
    match serde_json::from_slice::<T>(&resp.body) {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(Error::Unauthorized {
            code: None,
            message: format!("unexpected token response: {e}"),
            response: Some(Box::new(resp)),
        }),
    }
}
