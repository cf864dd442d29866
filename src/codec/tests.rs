//! Tests for the codec module

use super::*;
use crate::error::{Error, ErrorKind};
use crate::http::Response;
use crate::types::ContentKind;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename = "building")]
struct Building {
    id: u32,
    name: String,
}

fn response(status: u16, body: &str) -> Response {
    Response::new(
        StatusCode::from_u16(status).unwrap(),
        HeaderMap::new(),
        Bytes::from(body.to_string()),
    )
}

// ============================================================================
// Encoding Tests
// ============================================================================

#[test]
fn test_encode_json() {
    let body = encode(
        ContentKind::Json,
        &Building {
            id: 1,
            name: "HQ".into(),
        },
    )
    .unwrap();
    assert_eq!(body, Bytes::from(r#"{"id":1,"name":"HQ"}"#));
}

#[test]
fn test_encode_xml_uses_struct_root() {
    let body = encode(
        ContentKind::Xml,
        &Building {
            id: 7,
            name: "Annex".into(),
        },
    )
    .unwrap();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "<building><id>7</id><name>Annex</name></building>"
    );
}

#[test]
fn test_encode_form_from_struct() {
    let body = encode(
        ContentKind::Form,
        &json!({"grant_type": "client_credentials", "scope": null, "n": 3}),
    )
    .unwrap();
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.contains("grant_type=client_credentials"));
    assert!(text.contains("n=3"));
    assert!(!text.contains("scope"));
}

#[test]
fn test_encode_form_rejects_nested() {
    let err = encode(ContentKind::Form, &json!({"a": {"b": 1}})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_encode_form_pairs_escapes() {
    let body = encode_form([("client_secret", "a&b=c d")]);
    assert_eq!(body, Bytes::from("client_secret=a%26b%3Dc+d"));
}

#[test]
fn test_encode_multipart_is_rejected() {
    assert!(encode(ContentKind::Multipart, &json!({})).is_err());
}

// ============================================================================
// Decoding Tests
// ============================================================================

#[test]
fn test_decode_json() {
    let b: Building = decode(ContentKind::Json, br#"{"id":2,"name":"Lab"}"#).unwrap();
    assert_eq!(b.name, "Lab");
}

#[test]
fn test_decode_xml() {
    let b: Building = decode(
        ContentKind::Xml,
        b"<building><id>3</id><name>Depot</name></building>",
    )
    .unwrap();
    assert_eq!(
        b,
        Building {
            id: 3,
            name: "Depot".into()
        }
    );
}

#[test]
fn test_decode_empty_body_as_null() {
    decode::<()>(ContentKind::Json, b"").unwrap();
    let none: Option<Building> = decode(ContentKind::Xml, b"  \n").unwrap();
    assert!(none.is_none());
    let _: serde::de::IgnoredAny = decode(ContentKind::Json, b"").unwrap();
}

#[test]
fn test_decode_failure_includes_preview() {
    let err = decode::<Building>(ContentKind::Json, br#"{"id":"nope"}"#).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
    assert!(err.to_string().contains("body preview"));
}

// ============================================================================
// Vendor Error Tests
// ============================================================================

#[test]
fn test_parse_simple_error_body() {
    let parsed = parse_error_body(br#"{"code":"INVALID_ID","message":"Building not found"}"#);
    assert_eq!(parsed.code.as_deref(), Some("INVALID_ID"));
    assert_eq!(parsed.message.as_deref(), Some("Building not found"));
}

#[test]
fn test_parse_errors_array_body() {
    let parsed = parse_error_body(
        br#"{"httpStatus":400,"errors":[
            {"code":"INVALID_FIELD","field":"name","description":"must not be blank"},
            {"code":"INVALID_FIELD","field":"city","description":"too long"}
        ]}"#,
    );
    assert_eq!(parsed.code.as_deref(), Some("INVALID_FIELD"));
    assert_eq!(
        parsed.message.as_deref(),
        Some("name: must not be blank; city: too long")
    );
}

#[test]
fn test_parse_classic_html_error() {
    let html = r#"<html><head><title>Status page</title></head>
        <body style="font-family:sans-serif;">
        <p style="font-size:1.2em;font-weight:bold;">Conflict</p>
        <p>Error: Duplicate name</p>
        <p>You can get technical details <a href="http://x">here</a>.</p>
        </body></html>"#;
    let parsed = parse_error_body(html.as_bytes());
    assert_eq!(
        parsed.message.as_deref(),
        Some("Conflict: Error: Duplicate name: You can get technical details here.")
    );
    assert!(parsed.code.is_none());
}

#[test]
fn test_parse_plain_text_and_empty() {
    assert_eq!(
        parse_error_body(b"gateway exploded").message.as_deref(),
        Some("gateway exploded")
    );
    assert_eq!(parse_error_body(b""), VendorError::default());
}

#[test]
fn test_api_error_classification() {
    let err = api_error(response(404, r#"{"code":"NOT_FOUND","message":"gone"}"#));
    assert_eq!(err.kind(), ErrorKind::ClientError);
    assert_eq!(err.vendor_code(), Some("NOT_FOUND"));
    assert_eq!(err.raw_body(), Some(&br#"{"code":"NOT_FOUND","message":"gone"}"#[..]));

    let err = api_error(response(503, ""));
    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert_eq!(
        err.vendor_message(),
        Some("The server is temporarily overloaded or under maintenance.")
    );

    let err = api_error(response(401, ""));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.status(), Some(401));
}

#[test]
fn test_unauthorized_keeps_vendor_fields() {
    let err = api_error(response(
        401,
        r#"{"httpStatus":401,"errors":[{"code":"INVALID_TOKEN","description":"Token expired"}]}"#,
    ));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.vendor_code(), Some("INVALID_TOKEN"));
    assert_eq!(err.vendor_message(), Some("Token expired"));
    assert_eq!(err.status(), Some(401));

    let err = api_error(response(401, ""));
    assert!(err.vendor_code().is_none());
    assert!(err.vendor_message().unwrap().contains("valid authentication credentials"));
}
