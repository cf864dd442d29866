//! Response types
//!
//! A [`Response`] is produced for every completed HTTP exchange, successful
//! or not, and is carried inside errors so status and body stay inspectable.

use crate::types::ContentKind;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use std::borrow::Cow;
use std::time::Duration;

/// Raw HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body bytes
    pub body: Bytes,
    /// Time between sending the request and receiving the full body
    pub duration: Duration,
    /// When the response was received
    pub received_at: DateTime<Utc>,
}

impl Response {
    /// Create a response received now
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            duration: Duration::ZERO,
            received_at: Utc::now(),
        }
    }

    /// Canonical reason phrase for the status code
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Look up a header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Content kind declared by the `Content-Type` header
    pub fn content_kind(&self) -> Option<ContentKind> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(ContentKind::from_content_type)
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body size in bytes
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub(crate) fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// A decoded response together with the raw response it came from
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    /// Raw response
    pub response: Response,
    /// Decoded body
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Discard the raw response
    pub fn into_data(self) -> T {
        self.data
    }

    /// Transform the decoded body
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            response: self.response,
            data: f(self.data),
        }
    }
}
