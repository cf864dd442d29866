//! Request and response body encoding

use crate::error::{Error, Result};
use crate::types::ContentKind;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Longest body excerpt included in decode error messages
const PREVIEW_LEN: usize = 200;

/// Encode a value as a request body of the given kind
pub fn encode<T: Serialize + ?Sized>(kind: ContentKind, value: &T) -> Result<Bytes> {
    match kind {
        ContentKind::Json => serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::encode(e.to_string())),
        ContentKind::Xml => Ok(Bytes::from(quick_xml::se::to_string(value)?)),
        ContentKind::Form => {
            let value = serde_json::to_value(value).map_err(|e| Error::encode(e.to_string()))?;
            let Value::Object(map) = value else {
                return Err(Error::encode("form bodies must serialize to a flat object"));
            };
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in map {
                let value = match value {
                    Value::Null => continue,
                    Value::String(s) => s,
                    Value::Bool(_) | Value::Number(_) => value.to_string(),
                    Value::Array(_) | Value::Object(_) => {
                        return Err(Error::encode(format!(
                            "form field '{key}' must be a scalar"
                        )))
                    }
                };
                pairs.push((key, value));
            }
            Ok(encode_form(pairs))
        }
        ContentKind::Multipart | ContentKind::None => Err(Error::encode(format!(
            "{kind:?} bodies are not encoded from values"
        ))),
    }
}

/// Encode key/value pairs as `application/x-www-form-urlencoded`
pub fn encode_form<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Bytes
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in fields {
        serializer.append_pair(k.as_ref(), v.as_ref());
    }
    Bytes::from(serializer.finish())
}

/// Decode a response body.
///
/// An empty body decodes as JSON `null`, so `()`, `Option<T>` and
/// `serde::de::IgnoredAny` targets succeed on 204-style responses.
pub fn decode<T: DeserializeOwned>(kind: ContentKind, body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice(b"null").map_err(|e| decode_error(&e, body));
    }

    match kind {
        ContentKind::Xml => {
            let text = std::str::from_utf8(body)
                .map_err(|e| Error::decode(format!("XML body is not UTF-8: {e}")))?;
            quick_xml::de::from_str(text).map_err(|e| decode_error(&e, body))
        }
        _ => serde_json::from_slice(body).map_err(|e| decode_error(&e, body)),
    }
}

fn decode_error(err: &dyn std::fmt::Display, body: &[u8]) -> Error {
    let text = String::from_utf8_lossy(body);
    let preview: String = text.chars().take(PREVIEW_LEN).collect();
    Error::decode(format!("{err} (body preview: {preview:?})"))
}
