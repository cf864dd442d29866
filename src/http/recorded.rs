//! Recorded-response transport
//!
//! A deterministic [`Transport`] that replays scripted replies per
//! `(method, path)` and records every request it sees. Used to test the
//! executor, session and pagination logic without a live server.
//!
//! Replies queued for a route are consumed in order; the last one is
//! repeated once the queue is down to a single entry. Requests without a
//! route receive an empty 404.

use super::response::Response;
use super::transport::{Transport, TransportBody, TransportRequest};
use crate::error::{Error, Result};
use crate::types::Method;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Scripted response
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl RecordedResponse {
    /// Response with no body
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// JSON response
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::empty(status)
            .header(CONTENT_TYPE.as_str(), "application/json")
            .body(value.to_string())
    }

    /// XML response
    pub fn xml(status: u16, body: impl Into<String>) -> Self {
        Self::empty(status)
            .header(CONTENT_TYPE.as_str(), "application/xml")
            .body(body.into())
    }

    /// Plain text response
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::empty(status)
            .header(CONTENT_TYPE.as_str(), "text/plain")
            .body(body.into())
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Replace the body
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    fn into_response(self) -> Result<Response> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| Error::invalid_request(format!("invalid scripted status: {e}")))?;
        let mut headers = HeaderMap::new();
        for (k, v) in self.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| Error::invalid_request(format!("invalid scripted header: {e}")))?;
            let value = HeaderValue::from_str(&v)
                .map_err(|e| Error::invalid_request(format!("invalid scripted header: {e}")))?;
            headers.append(name, value);
        }
        Ok(Response::new(status, headers, self.body))
    }
}

/// What a route answers with
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return a response
    Respond(RecordedResponse),
    /// Fail at the network level
    Fail(Error),
}

impl From<RecordedResponse> for Reply {
    fn from(resp: RecordedResponse) -> Self {
        Reply::Respond(resp)
    }
}

/// A request as seen by the recorded transport
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: Method,
    /// URL path
    pub path: String,
    /// Decoded query pairs, in wire order
    pub query: Vec<(String, String)>,
    /// Headers
    pub headers: HeaderMap,
    /// Fully drained body
    pub body: Bytes,
}

impl RecordedRequest {
    /// First value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as text
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

type Handler = Arc<dyn Fn(&RecordedRequest) -> Reply + Send + Sync>;

enum Script {
    Queue(VecDeque<Reply>),
    Handler(Handler),
}

struct Route {
    method: Method,
    path: String,
    script: Script,
}

/// Deterministic test double for [`Transport`]
#[derive(Default)]
pub struct RecordedTransport {
    routes: Mutex<Vec<Route>>,
    log: Mutex<Vec<RecordedRequest>>,
    latency: Option<Duration>,
}

impl RecordedTransport {
    /// Create a transport with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply by `latency`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a reply for `(method, path)`
    pub fn on(&self, method: Method, path: &str, reply: impl Into<Reply>) -> &Self {
        let reply = reply.into();
        let mut routes = self.routes.lock();
        let existing = routes.iter_mut().find(|r| {
            r.method == method && r.path == path && matches!(r.script, Script::Queue(_))
        });
        match existing {
            Some(Route {
                script: Script::Queue(queue),
                ..
            }) => queue.push_back(reply),
            _ => routes.push(Route {
                method,
                path: path.to_string(),
                script: Script::Queue(VecDeque::from([reply])),
            }),
        }
        self
    }

    /// Answer `(method, path)` by calling `handler` for each request
    pub fn on_fn<F>(&self, method: Method, path: &str, handler: F) -> &Self
    where
        F: Fn(&RecordedRequest) -> Reply + Send + Sync + 'static,
    {
        self.routes.lock().push(Route {
            method,
            path: path.to_string(),
            script: Script::Handler(Arc::new(handler)),
        });
        self
    }

    /// All requests seen so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().clone()
    }

    /// Number of requests seen for `(method, path)`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn next_reply(&self, request: &RecordedRequest) -> Reply {
        let handler = {
            let mut routes = self.routes.lock();
            let Some(route) = routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == request.path)
            else {
                return Reply::Respond(RecordedResponse::empty(404));
            };
            match &mut route.script {
                Script::Queue(queue) => {
                    let reply = if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    };
                    return reply.unwrap_or(Reply::Respond(RecordedResponse::empty(404)));
                }
                Script::Handler(handler) => Arc::clone(handler),
            }
        };
        handler(request)
    }
}

#[async_trait]
impl Transport for RecordedTransport {
    async fn send(&self, request: TransportRequest) -> Result<Response> {
        let body = match request.body {
            TransportBody::Empty => Bytes::new(),
            TransportBody::Bytes(bytes) => bytes,
            TransportBody::Stream { mut stream, .. } => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                buf.freeze()
            }
        };

        let recorded = RecordedRequest {
            method: request.method,
            path: request.url.path().to_string(),
            query: request
                .url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            headers: request.headers,
            body,
        };
        self.log.lock().push(recorded.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.next_reply(&recorded) {
            Reply::Respond(resp) => resp.into_response(),
            Reply::Fail(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for RecordedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordedTransport")
            .field("routes", &self.routes.lock().len())
            .field("requests", &self.log.lock().len())
            .finish()
    }
}
