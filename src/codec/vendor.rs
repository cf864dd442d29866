//! Vendor error body parsing
//!
//! Jamf Pro reports errors in three shapes:
//! - `{"code": "...", "message": "..."}`
//! - `{"httpStatus": 400, "errors": [{"code", "description", "field"}]}`
//! - Classic API HTML status pages with the detail in `<p>` elements

use crate::error::{default_message_for_status, Error};
use crate::http::Response;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// Paragraph contents of a Classic API HTML error page
static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("PARAGRAPH regex should compile")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("TAG regex should compile"));

/// Code and message extracted from an error body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorError {
    /// Vendor error code
    pub code: Option<String>,
    /// Human readable message
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct SimpleBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorsBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    field: Option<String>,
}

/// Extract a vendor code and message from an error body
pub fn parse_error_body(body: &[u8]) -> VendorError {
    if let Ok(parsed) = serde_json::from_slice::<ErrorsBody>(body) {
        if let Some(first) = parsed.errors.first() {
            let message = parsed
                .errors
                .iter()
                .filter_map(|e| match (&e.field, &e.description) {
                    (Some(field), Some(desc)) => Some(format!("{field}: {desc}")),
                    (None, Some(desc)) => Some(desc.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("; ");
            return VendorError {
                code: first.code.clone().filter(|c| !c.is_empty()),
                message: Some(message).filter(|m| !m.is_empty()),
            };
        }
    }

    if let Ok(parsed) = serde_json::from_slice::<SimpleBody>(body) {
        let code = parsed.code.filter(|c| !c.is_empty());
        let message = parsed.message.filter(|m| !m.is_empty());
        if code.is_some() || message.is_some() {
            return VendorError { code, message };
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return VendorError::default();
    }

    if text.starts_with('<') {
        let paragraphs: Vec<String> = PARAGRAPH
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| TAG.replace_all(m.as_str(), "").trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return VendorError {
                code: None,
                message: Some(paragraphs.join(": ")),
            };
        }
    }

    VendorError {
        code: None,
        message: Some(text.to_string()),
    }
}

/// Build the structured error for a non-2xx response
pub fn api_error(resp: Response) -> Error {
    let status = resp.status.as_u16();
    let parsed = parse_error_body(&resp.body);
    let message = parsed
        .message
        .unwrap_or_else(|| default_message_for_status(status).to_string());

    if status == 401 {
        return Error::Unauthorized {
            code: parsed.code,
            message,
            response: Some(Box::new(resp)),
        };
    }

    if resp.status.is_server_error() {
        Error::ServerError {
            status,
            code: parsed.code,
            message,
            response: Box::new(resp),
        }
    } else {
        Error::ClientError {
            status,
            code: parsed.code,
            message,
            response: Box::new(resp),
        }
    }
}
