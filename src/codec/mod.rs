//! Body codec module
//!
//! Supports: JSON, XML (Classic API), form-urlencoded
//!
//! # Overview
//!
//! Encodes request bodies and decodes response bodies according to the
//! declared [`ContentKind`](crate::types::ContentKind), and turns non-2xx
//! responses into structured errors by parsing the vendor's error formats.

mod body;
mod vendor;

pub use body::{decode, encode, encode_form};
pub use vendor::{api_error, parse_error_body, VendorError};

#[cfg(test)]
mod tests;
