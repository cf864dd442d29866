//! Error types for the Jamf Pro transport core
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Every error that originated from an HTTP exchange keeps the [`Response`]
//! so callers can inspect status, headers and raw body after the fact.

use crate::http::Response;
use thiserror::Error;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failure, timeout or cancellation
    Network,
    /// Credentials rejected or token could not be obtained
    Unauthorized,
    /// HTTP 4xx other than 401
    ClientError,
    /// HTTP 5xx
    ServerError,
    /// Body shape did not match the target type
    Decode,
    /// Pagination safety cap reached
    PaginationInconsistency,
    /// Caller supplied an invalid configuration, request or filter
    InvalidInput,
}

/// The main error type for the crate
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ============================================================================
    // Input Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid filter: {message}")]
    InvalidFilter { message: String },

    #[error("Failed to encode request body: {message}")]
    Encode { message: String },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("Network error: {message}")]
    Network { message: String, transient: bool },

    #[error("Operation cancelled")]
    Cancelled,

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("Unauthorized: {message}")]
    Unauthorized {
        code: Option<String>,
        message: String,
        response: Option<Box<Response>>,
    },

    #[error("{}", format_api_error(*status, code.as_deref(), message))]
    ClientError {
        status: u16,
        code: Option<String>,
        message: String,
        response: Box<Response>,
    },

    #[error("{}", format_api_error(*status, code.as_deref(), message))]
    ServerError {
        status: u16,
        code: Option<String>,
        message: String,
        response: Box<Response>,
    },

    #[error("Failed to decode response: {message}")]
    Decode {
        message: String,
        response: Option<Box<Response>>,
    },

    // ============================================================================
    // Pagination Errors
    // ============================================================================
    #[error(
        "Pagination stopped after {pages_fetched} pages ({items_merged} items merged, reported total {})",
        reported_total.map_or_else(|| "unknown".to_string(), |t| t.to_string())
    )]
    PaginationInconsistency {
        pages_fetched: u32,
        items_merged: u64,
        reported_total: Option<u64>,
        response: Option<Box<Response>>,
    },
}

fn format_api_error(status: u16, code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("Jamf Pro API error ({status}) [{code}]: {message}"),
        None => format!("Jamf Pro API error ({status}): {message}"),
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create an invalid filter error
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    /// Create an encode error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>, transient: bool) -> Self {
        Self::Network {
            message: message.into(),
            transient,
        }
    }

    /// Create an unauthorized error without a response
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: None,
            message: message.into(),
            response: None,
        }
    }

    /// Create a decode error without a response
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            response: None,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. }
            | Error::InvalidRequest { .. }
            | Error::InvalidFilter { .. }
            | Error::Encode { .. } => ErrorKind::InvalidInput,
            Error::Network { .. } | Error::Cancelled => ErrorKind::Network,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::ClientError { .. } => ErrorKind::ClientError,
            Error::ServerError { .. } => ErrorKind::ServerError,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::PaginationInconsistency { .. } => ErrorKind::PaginationInconsistency,
        }
    }

    /// HTTP status, if the error came from an HTTP exchange
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ClientError { status, .. } | Error::ServerError { status, .. } => Some(*status),
            _ => self.response().map(|r| r.status.as_u16()),
        }
    }

    /// Vendor error code parsed from the body
    pub fn vendor_code(&self) -> Option<&str> {
        match self {
            Error::ClientError { code, .. }
            | Error::ServerError { code, .. }
            | Error::Unauthorized { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Vendor error message parsed from the body
    pub fn vendor_message(&self) -> Option<&str> {
        match self {
            Error::ClientError { message, .. }
            | Error::ServerError { message, .. }
            | Error::Unauthorized { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    /// The response that produced this error, if any
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::ClientError { response, .. } | Error::ServerError { response, .. } => {
                Some(response)
            }
            Error::Unauthorized { response, .. }
            | Error::Decode { response, .. }
            | Error::PaginationInconsistency { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// Raw response body for diagnostics
    pub fn raw_body(&self) -> Option<&[u8]> {
        self.response().map(|r| r.body.as_ref())
    }

    /// Attach a response to errors that can carry one
    #[must_use]
    pub fn with_response(self, resp: Response) -> Self {
        match self {
            Error::Unauthorized { code, message, .. } => Error::Unauthorized {
                code,
                message,
                response: Some(Box::new(resp)),
            },
            Error::Decode { message, .. } => Error::Decode {
                message,
                response: Some(Box::new(resp)),
            },
            Error::PaginationInconsistency {
                pages_fetched,
                items_merged,
                reported_total,
                ..
            } => Error::PaginationInconsistency {
                pages_fetched,
                items_merged,
                reported_total,
                response: Some(Box::new(resp)),
            },
            other => other,
        }
    }

    /// Check if this error is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network { transient, .. } => *transient,
            Error::ServerError { status, .. } => is_retryable_status(*status),
            Error::ClientError { status, .. } => *status == 429,
            _ => false,
        }
    }

    /// Check if the caller cancelled the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check for HTTP 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check for an authentication failure
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    /// Check for HTTP 5xx
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::ServerError { .. })
    }
}

/// Check if an HTTP status code is retryable: any 5xx, or 429
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Canned description used when an error body is empty
pub(crate) fn default_message_for_status(status: u16) -> &'static str {
    match status {
        400 => "The request could not be understood by the server due to malformed syntax.",
        401 => "The request lacks valid authentication credentials for the target resource.",
        403 => "The server understood the request but refuses to authorize it.",
        404 => "The server has not found anything matching the Request-URI.",
        409 => "The request conflicts with the current state of the resource.",
        412 => "One or more conditions in the request header fields evaluated to false.",
        422 => "The request has correct syntax but contains a field with a bad value.",
        429 => "Too many requests have been sent in a given amount of time.",
        500 => "The server encountered an unexpected condition.",
        503 => "The server is temporarily overloaded or under maintenance.",
        _ => "Unknown error",
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let transient = e.is_timeout() || e.is_connect() || e.is_request() || e.is_body();
        Error::Network {
            message: e.to_string(),
            transient,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let transient = matches!(
            e.kind(),
            Io::ConnectionReset | Io::ConnectionAborted | Io::TimedOut | Io::Interrupted
        );
        Error::Network {
            message: e.to_string(),
            transient,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::decode(e.to_string())
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(e: quick_xml::DeError) -> Self {
        Error::decode(e.to_string())
    }
}

impl From<quick_xml::SeError> for Error {
    fn from(e: quick_xml::SeError) -> Self {
        Error::encode(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::config(format!("invalid URL: {e}"))
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
