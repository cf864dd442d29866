//! Transport abstraction
//!
//! A [`Transport`] performs exactly one HTTP exchange. Retry, auth and
//! decoding live above it in the executor, so the same logic runs against
//! the real network ([`ReqwestTransport`]) or the recorded test double.

use super::response::Response;
use crate::error::{Error, Result};
use crate::types::Method;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Body handed to a transport
pub enum TransportBody {
    /// No body
    Empty,
    /// Buffered body
    Bytes(Bytes),
    /// Streamed body
    Stream {
        /// Chunk stream
        stream: BoxStream<'static, Result<Bytes>>,
        /// Total length, if known
        length: Option<u64>,
    },
}

impl std::fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportBody::Empty => f.write_str("Empty"),
            TransportBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            TransportBody::Stream { length, .. } => write!(f, "Stream({length:?})"),
        }
    }
}

/// One fully resolved HTTP exchange
#[derive(Debug)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including query
    pub url: Url,
    /// Headers, including authorization
    pub headers: HeaderMap,
    /// Body
    pub body: TransportBody,
    /// Timeout override
    pub timeout: Option<Duration>,
}

/// Sends a single request and returns the buffered response
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the exchange. Non-2xx statuses are returned as `Ok`.
    async fn send(&self, request: TransportRequest) -> Result<Response>;
}

/// Transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a cookie store, the given timeout and user agent
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<Response> {
        let mut req = self
            .client
            .request(request.method.into(), request.url)
            .headers(request.headers);

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req = match request.body {
            TransportBody::Empty => req,
            TransportBody::Bytes(bytes) => req.body(bytes),
            TransportBody::Stream { stream, length } => {
                if let Some(len) = length {
                    req = req.header(reqwest::header::CONTENT_LENGTH, len);
                }
                req.body(reqwest::Body::wrap_stream(stream))
            }
        };

        let resp = req.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        trace!(status = status.as_u16(), bytes = body.len(), "Response received");

        Ok(Response::new(status, headers, body))
    }
}
