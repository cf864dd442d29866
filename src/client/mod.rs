//! Client module
//!
//! [`ApiClient`] is the capability interface resource wrappers depend on.
//! [`Client`] implements it with one [`SessionManager`](crate::auth::SessionManager)
//! and one [`RequestExecutor`](crate::http::RequestExecutor) sharing a
//! transport, so tests can swap in a
//! [`RecordedTransport`](crate::http::RecordedTransport).

mod api;
mod jamf;

pub use api::ApiClient;
pub use jamf::Client;
