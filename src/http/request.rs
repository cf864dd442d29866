//! Request types
//!
//! A [`Request`] describes one logical API call. The executor turns it into
//! one or more transport-level sends (retries, token refresh).

use crate::codec;
use crate::error::{Error, Result};
use crate::types::{ApiGeneration, ContentKind, Method, QueryParams};
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Encoded request body
pub enum Body {
    /// Fully buffered body; can be replayed on retry
    Buffered {
        /// Encoded bytes
        bytes: Bytes,
        /// `Content-Type` header value
        content_type: String,
    },
    /// Streamed body; sent at most once
    Streamed {
        /// Chunk stream
        stream: BoxStream<'static, Result<Bytes>>,
        /// `Content-Type` header value
        content_type: String,
        /// Total length, if known
        length: Option<u64>,
    },
}

impl Body {
    /// `Content-Type` header value
    pub fn content_type(&self) -> &str {
        match self {
            Body::Buffered { content_type, .. } | Body::Streamed { content_type, .. } => {
                content_type
            }
        }
    }

    /// Check if this body can be sent more than once
    pub fn is_replayable(&self) -> bool {
        matches!(self, Body::Buffered { .. })
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Buffered {
                bytes,
                content_type,
            } => f
                .debug_struct("Buffered")
                .field("content_type", content_type)
                .field("len", &bytes.len())
                .finish(),
            Body::Streamed {
                content_type,
                length,
                ..
            } => f
                .debug_struct("Streamed")
                .field("content_type", content_type)
                .field("length", length)
                .finish_non_exhaustive(),
        }
    }
}

/// Per-call options accepted by every client operation
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// Cancellation signal
    pub cancel: Option<CancellationToken>,
    /// Timeout override
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A single API call
#[derive(Debug)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Path relative to the instance URL
    pub path: String,
    /// Query parameters, in wire order
    pub query: QueryParams,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// Encoded body
    pub body: Option<Body>,
    /// Declared body kind
    pub content: ContentKind,
    /// Expected response kind
    pub accept: ContentKind,
    /// Whether a bearer token is attached
    pub requires_auth: bool,
    /// Cancellation signal
    pub cancel: Option<CancellationToken>,
    /// Timeout override
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a request without a body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let accept = ApiGeneration::for_path(&path).content_kind();
        Self {
            method,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            content: ContentKind::None,
            accept,
            requires_auth: true,
            cancel: None,
            timeout: None,
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add several query parameters, keeping their order
    #[must_use]
    pub fn queries<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Encode a body using the default kind for this path's API generation
    pub fn payload<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let kind = ApiGeneration::for_path(&self.path).content_kind();
        self.body_as(kind, value)
    }

    /// Encode a JSON body
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        self.body_as(ContentKind::Json, value)
    }

    /// Encode an XML body
    pub fn xml<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        self.body_as(ContentKind::Xml, value)
    }

    /// Encode a body of the given kind
    pub fn body_as<T: Serialize + ?Sized>(mut self, kind: ContentKind, value: &T) -> Result<Self> {
        let Some(content_type) = kind.mime() else {
            return Err(Error::invalid_request(format!(
                "{kind:?} bodies cannot be encoded from a value"
            )));
        };
        let bytes = codec::encode(kind, value)?;
        self.body = Some(Body::Buffered {
            bytes,
            content_type: content_type.to_string(),
        });
        self.content = kind;
        Ok(self)
    }

    /// Encode an `application/x-www-form-urlencoded` body
    #[must_use]
    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.body = Some(Body::Buffered {
            bytes: codec::encode_form(fields),
            content_type: ContentKind::Form.mime().unwrap_or_default().to_string(),
        });
        self.content = ContentKind::Form;
        self
    }

    /// Attach a pre-encoded streamed body
    #[must_use]
    pub fn stream_body(
        mut self,
        kind: ContentKind,
        content_type: impl Into<String>,
        stream: BoxStream<'static, Result<Bytes>>,
        length: Option<u64>,
    ) -> Self {
        self.body = Some(Body::Streamed {
            stream,
            content_type: content_type.into(),
            length,
        });
        self.content = kind;
        self
    }

    /// Override the expected response kind
    #[must_use]
    pub fn accept(mut self, kind: ContentKind) -> Self {
        self.accept = kind;
        self
    }

    /// Send without a bearer token
    #[must_use]
    pub fn without_auth(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply per-call options
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.headers.extend(options.headers);
        if options.cancel.is_some() {
            self.cancel = options.cancel;
        }
        if options.timeout.is_some() {
            self.timeout = options.timeout;
        }
        self
    }

    /// Whether the body, if any, can be replayed
    pub fn is_replayable(&self) -> bool {
        self.body.as_ref().map_or(true, Body::is_replayable)
    }
}
