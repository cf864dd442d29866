// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Jamf Pro Transport Core
//!
//! The shared plumbing every Jamf Pro resource wrapper sits on: one
//! authenticated session, one request path with retries, list pagination,
//! RSQL filters and streamed uploads.
//!
//! ## Features
//!
//! - **Session Management**: OAuth2 client credentials or basic-auth tokens,
//!   refreshed at most once at a time no matter how many callers wait
//! - **Request Execution**: Bounded retries for transient failures, one
//!   token refresh on HTTP 401, structured vendor errors
//! - **Both API Generations**: JSON for `/api/v{n}`, XML for `/JSSResource`
//! - **Pagination**: Page-by-page walks with a caller-owned accumulator
//! - **RSQL Filters**: Validated, escaped `filter` query values
//! - **Uploads**: Streamed `multipart/form-data` with progress and cancellation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jamfpro_core::{ApiClient, AuthMode, Client, ClientConfig, RequestOptions, Result};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder(
//!         "https://example.jamfcloud.com",
//!         AuthMode::token_exchange("client-id", "client-secret"),
//!     )
//!     .build()?;
//!     let client = Client::new(config)?;
//!
//!     let filter = client.filter_builder().starts_with("name", "HQ").build()?;
//!     let buildings = client
//!         .get::<Value>(
//!             "api/v1/buildings",
//!             &[("filter".to_string(), filter)],
//!             RequestOptions::default(),
//!         )
//!         .await?;
//!     println!("{}", buildings.data);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ApiClient (Client)                         │
//! │  get/post/put/patch/delete   get_paginated   post_multipart     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │  Session │ Executor  │  Pagination   │  Filter   │   Upload    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ OAuth2   │ Retry     │ page/size     │ RSQL      │ Multipart   │
//! │ Basic    │ 401 retry │ Total/short   │ Escaping  │ Progress    │
//! │ Refresh  │ Throttle  │ Safety cap    │ Groups    │ Cancel      │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//!                                │
//!                 Transport (reqwest | recorded replies)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Credentials and client configuration
pub mod config;

/// Access token lifecycle
pub mod auth;

/// Request and response body codecs
pub mod codec;

/// Request executor and transports
pub mod http;

/// List endpoint pagination
pub mod pagination;

/// RSQL filter expressions
pub mod filter;

/// Multipart uploads
pub mod upload;

/// Capability interface and default client
pub mod client;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::{KeepAliveOutcome, SessionManager, SessionState};
pub use client::{ApiClient, Client};
pub use config::{AuthMode, ClientConfig, Credentials, RefreshMargin, SessionConfig};
pub use filter::{Filter, FilterBuilder, JoinStyle};
pub use http::{ApiResponse, ExecutorConfig, RequestOptions, Response, Transport};
pub use pagination::{PageParams, PageSummary, PaginationOptions};
pub use upload::{MultipartUpload, UploadSource};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
