//! HTTP execution module
//!
//! Provides the request executor and the transport abstraction it runs on.
//!
//! # Features
//!
//! - **Automatic Retries**: Bounded retries with backoff for transient failures
//! - **Token Refresh**: One invalidate-and-retry on HTTP 401
//! - **Content Negotiation**: JSON for the versioned API, XML for Classic
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Adaptive Throttling**: Pauses when the server slows down
//! - **Pluggable Transport**: `reqwest` in production, recorded replies in tests

mod executor;
mod rate_limit;
mod recorded;
mod request;
mod response;
mod transport;

pub use executor::{decode_response, ExecutorConfig, ExecutorConfigBuilder, RequestExecutor};
pub(crate) use executor::sleep_or_cancel;
pub use rate_limit::{RateLimiter, RateLimiterConfig, ResponseTimeTracker, ADAPTIVE_DELAY_MAX};
pub use recorded::{RecordedRequest, RecordedResponse, RecordedTransport, Reply};
pub use request::{Body, Request, RequestOptions};
pub use response::{ApiResponse, Response};
pub use transport::{ReqwestTransport, Transport, TransportBody, TransportRequest};
