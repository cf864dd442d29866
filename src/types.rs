//! Common types used throughout the crate
//!
//! This module contains shared type definitions used across the
//! session, executor, pagination and upload modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Ordered query parameters. Order is preserved on the wire.
pub type QueryParams = Vec<(String, String)>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl Method {
    /// Methods whose repetition has no additional effect on the server
    pub fn is_idempotent(self) -> bool {
        matches!(self, Method::GET | Method::PUT | Method::DELETE)
    }

    /// Method name as sent on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

// ============================================================================
// Content Negotiation
// ============================================================================

/// Declared encoding of a request or response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// `application/json`
    #[default]
    Json,
    /// `application/xml` (Classic API)
    Xml,
    /// `application/x-www-form-urlencoded`
    Form,
    /// `multipart/form-data`
    Multipart,
    /// No body
    None,
}

impl ContentKind {
    /// MIME type for this content kind, if it has a fixed one.
    ///
    /// Multipart bodies carry a boundary parameter and are built by the
    /// upload module.
    pub fn mime(self) -> Option<&'static str> {
        match self {
            ContentKind::Json => Some("application/json"),
            ContentKind::Xml => Some("application/xml"),
            ContentKind::Form => Some("application/x-www-form-urlencoded"),
            ContentKind::Multipart | ContentKind::None => None,
        }
    }

    /// Infer the content kind from a `Content-Type` header value
    pub fn from_content_type(value: &str) -> Option<Self> {
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/json" | "text/json" => Some(ContentKind::Json),
            "application/xml" | "text/xml" => Some(ContentKind::Xml),
            "application/x-www-form-urlencoded" => Some(ContentKind::Form),
            "multipart/form-data" => Some(ContentKind::Multipart),
            e if e.ends_with("+json") => Some(ContentKind::Json),
            e if e.ends_with("+xml") => Some(ContentKind::Xml),
            _ => None,
        }
    }
}

/// Jamf Pro API generation, inferred from the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiGeneration {
    /// XML API under `/JSSResource`
    Classic,
    /// JSON API under `/api/v{n}`
    Versioned,
}

impl ApiGeneration {
    /// Classify a request path
    pub fn for_path(path: &str) -> Self {
        let trimmed = path.trim_start_matches('/');
        if trimmed.starts_with("JSSResource") {
            ApiGeneration::Classic
        } else {
            ApiGeneration::Versioned
        }
    }

    /// Default body encoding for this generation
    pub fn content_kind(self) -> ContentKind {
        match self {
            ApiGeneration::Classic => ContentKind::Xml,
            ApiGeneration::Versioned => ContentKind::Json,
        }
    }
}

// ============================================================================
// Backoff Types
// ============================================================================

/// Backoff strategy for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}
