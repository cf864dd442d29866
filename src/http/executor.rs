//! Request executor with retry, token refresh and throttling
//!
//! Provides the single code path every API call goes through:
//! - Bearer token attachment via the session manager
//! - One invalidate-and-retry on HTTP 401
//! - Bounded retries with backoff for transient network errors, 5xx and 429
//! - Structured errors for every non-2xx status
//! - Rate limiting, concurrency limiting and adaptive throttling

use super::rate_limit::{RateLimiter, RateLimiterConfig, ResponseTimeTracker};
use super::request::{Body, Request};
use super::response::{ApiResponse, Response};
use super::transport::{Transport, TransportBody, TransportRequest};
use crate::auth::SessionManager;
use crate::codec;
use crate::error::{is_retryable_status, Error, Result};
use crate::types::{BackoffType, ContentKind};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;

/// Configuration for the request executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Only retry GET, PUT and DELETE
    pub idempotent_only: bool,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Maximum number of requests in flight
    pub max_concurrent_requests: Option<usize>,
    /// Fixed pause before every request
    pub request_delay: Option<Duration>,
    /// Pause when responses slow down relative to their moving average
    pub adaptive_throttling: bool,
    /// Default headers for all requests
    pub default_headers: Vec<(String, String)>,
    /// User agent string
    pub user_agent: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_type: BackoffType::Exponential,
            idempotent_only: false,
            rate_limit: None,
            max_concurrent_requests: None,
            request_delay: None,
            adaptive_throttling: true,
            default_headers: Vec::new(),
            user_agent: format!("jamfpro-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ExecutorConfig {
    /// Create a new config builder
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be greater than zero"));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(Error::config("initial_backoff must not exceed max_backoff"));
        }
        if self.max_concurrent_requests == Some(0) {
            return Err(Error::config("max_concurrent_requests must be at least 1"));
        }
        Ok(())
    }

    /// Calculate backoff delay for a given attempt (zero-based)
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }
}

/// Builder for executor config
#[derive(Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Only retry idempotent methods
    pub fn idempotent_only(mut self, enabled: bool) -> Self {
        self.config.idempotent_only = enabled;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Cap the number of requests in flight
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.config.max_concurrent_requests = Some(limit);
        self
    }

    /// Pause before every request
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.config.request_delay = Some(delay);
        self
    }

    /// Enable or disable adaptive throttling
    pub fn adaptive_throttling(mut self, enabled: bool) -> Self {
        self.config.adaptive_throttling = enabled;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((key.into(), value.into()));
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ExecutorConfig {
        self.config
    }
}

/// Executes [`Request`]s against a [`Transport`]
pub struct RequestExecutor {
    base_url: Url,
    transport: Arc<dyn Transport>,
    session: Option<Arc<SessionManager>>,
    config: ExecutorConfig,
    rate_limiter: Option<RateLimiter>,
    semaphore: Option<Arc<Semaphore>>,
    throttle: Option<ResponseTimeTracker>,
    hide_sensitive_data: bool,
}

impl RequestExecutor {
    /// Create an executor. Without a session, requests that require auth fail.
    pub fn new(
        base_url: Url,
        transport: Arc<dyn Transport>,
        session: Option<Arc<SessionManager>>,
        config: ExecutorConfig,
    ) -> Self {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        let semaphore = config
            .max_concurrent_requests
            .map(|n| Arc::new(Semaphore::new(n)));
        let throttle = config
            .adaptive_throttling
            .then(ResponseTimeTracker::default);

        Self {
            base_url,
            transport,
            session,
            config,
            rate_limiter,
            semaphore,
            throttle,
            hide_sensitive_data: false,
        }
    }

    /// Omit query strings from logs
    #[must_use]
    pub fn hide_sensitive_data(mut self, hide: bool) -> Self {
        self.hide_sensitive_data = hide;
        self
    }

    /// The session manager, if any
    pub fn session(&self) -> Option<&Arc<SessionManager>> {
        self.session.as_ref()
    }

    /// Executor settings
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a request and decode a 2xx body into `T`.
    ///
    /// The body kind is taken from the response `Content-Type`, falling
    /// back to the request's accept kind. A decode failure keeps the
    /// response in the returned error.
    pub async fn execute_decoded<T: DeserializeOwned>(
        &self,
        request: Request,
    ) -> Result<ApiResponse<T>> {
        let accept = request.accept;
        let response = self.execute(request).await?;
        decode_response(response, accept)
    }

    /// Execute a request, returning the raw 2xx response.
    ///
    /// Non-2xx statuses become structured errors that carry the response.
    pub async fn execute(&self, mut request: Request) -> Result<Response> {
        let cancel = request.cancel.clone().unwrap_or_default();

        let _permit = match &self.semaphore {
            Some(sem) => Some(tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                permit = Arc::clone(sem).acquire_owned() => permit
                    .map_err(|_| Error::network("executor is shutting down", false))?,
            }),
            None => None,
        };

        let url = self.build_url(&request)?;
        let headers = self.build_headers(&request)?;
        let log_target = if self.hide_sensitive_data {
            request.path.clone()
        } else {
            url.to_string()
        };

        let mut one_shot = None;
        let replayable = match request.body.take() {
            None => Some(TransportBody::Empty),
            Some(Body::Buffered { bytes, .. }) => Some(TransportBody::Bytes(bytes)),
            Some(Body::Streamed { stream, length, .. }) => {
                one_shot = Some(TransportBody::Stream { stream, length });
                None
            }
        };
        let retry_allowed = !self.config.idempotent_only || request.method.is_idempotent();

        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;
        let mut auth_retried = false;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.pace(&cancel).await?;

            let token = if request.requires_auth {
                let session = self
                    .session
                    .as_ref()
                    .ok_or_else(|| Error::unauthorized("no session configured"))?;
                Some(session.ensure_valid_with(&cancel).await?)
            } else {
                None
            };

            let mut attempt_headers = headers.clone();
            if let Some(token) = &token {
                attempt_headers.insert(AUTHORIZATION, token.bearer_header()?);
            }

            let body = match &replayable {
                Some(TransportBody::Bytes(bytes)) => TransportBody::Bytes(bytes.clone()),
                Some(_) => TransportBody::Empty,
                None => one_shot.take().ok_or_else(|| {
                    Error::invalid_request("streamed request body was already consumed")
                })?,
            };
            let can_replay = replayable.is_some();

            debug!(
                method = %request.method,
                endpoint = %log_target,
                attempt = attempt + 1,
                "Sending request"
            );

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                r = self.transport.send(TransportRequest {
                    method: request.method,
                    url: url.clone(),
                    headers: attempt_headers,
                    body,
                    timeout: request.timeout,
                }) => r,
            };

            let response = match outcome {
                Err(_) if cancel.is_cancelled() => return Err(Error::Cancelled),
                Err(e) => {
                    if e.is_transient() && can_replay && retry_allowed && attempt < max_retries {
                        let delay = self.config.calculate_backoff(attempt);
                        warn!(
                            "Request error ({}), attempt {}/{}, retrying in {:?}",
                            e,
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        sleep_or_cancel(delay, &cancel).await?;
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
                Ok(resp) => resp.with_duration(started.elapsed()),
            };

            self.observe(&response, &log_target, &cancel).await?;
            let status = response.status;

            if status.is_success() {
                debug!(
                    method = %request.method,
                    endpoint = %log_target,
                    status = status.as_u16(),
                    elapsed_ms = response.duration.as_millis() as u64,
                    "Request succeeded"
                );
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED {
                if let (Some(token), Some(session)) = (&token, &self.session) {
                    if !auth_retried && can_replay {
                        warn!(
                            endpoint = %log_target,
                            "Received 401, invalidating token and retrying once"
                        );
                        session.invalidate_if_current(token);
                        auth_retried = true;
                        continue;
                    }
                }
                return Err(codec::api_error(response));
            }

            if is_retryable_status(status.as_u16())
                && can_replay
                && retry_allowed
                && attempt < max_retries
            {
                let delay = self
                    .retry_after(&response)
                    .unwrap_or_else(|| self.config.calculate_backoff(attempt));
                warn!(
                    "Request failed with {}, attempt {}/{}, retrying in {:?}",
                    status.as_u16(),
                    attempt + 1,
                    max_retries + 1,
                    delay
                );
                sleep_or_cancel(delay, &cancel).await?;
                attempt += 1;
                continue;
            }

            let err = codec::api_error(response);
            error!(
                method = %request.method,
                endpoint = %log_target,
                status = status.as_u16(),
                "API error response: {}",
                err
            );
            return Err(err);
        }
    }

    /// Apply rate limit and fixed delay before a send
    async fn pace(&self, cancel: &CancellationToken) -> Result<()> {
        if let Some(ref limiter) = self.rate_limiter {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = limiter.wait() => {}
            }
        }
        if let Some(delay) = self.config.request_delay {
            sleep_or_cancel(delay, cancel).await?;
        }
        Ok(())
    }

    /// Log deprecation notices and apply adaptive throttling
    async fn observe(
        &self,
        response: &Response,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(deprecation) = response.header("Deprecation") {
            warn!(
                endpoint = %target,
                deprecation = %deprecation,
                sunset = response.header("Sunset").unwrap_or(""),
                "Jamf Pro API endpoint is deprecated"
            );
        }

        if let Some(tracker) = &self.throttle {
            let pause = tracker.record(response.duration);
            if !pause.is_zero() {
                debug!(pause_ms = pause.as_millis() as u64, "Server slowing down, pausing");
                sleep_or_cancel(pause, cancel).await?;
            }
        }
        Ok(())
    }

    /// `Retry-After` in seconds, if present and within the backoff cap
    fn retry_after(&self, response: &Response) -> Option<Duration> {
        let secs: u64 = response
            .headers
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()?;
        let delay = Duration::from_secs(secs);
        (delay <= self.config.max_backoff).then_some(delay)
    }

    /// Build full URL from path and query
    fn build_url(&self, request: &Request) -> Result<Url> {
        let mut url = if request.path.starts_with("http://") || request.path.starts_with("https://")
        {
            Url::parse(&request.path)?
        } else {
            let base = self.base_url.as_str().trim_end_matches('/');
            let path = request.path.trim_start_matches('/');
            Url::parse(&format!("{base}/{path}"))?
        };

        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    fn build_headers(&self, request: &Request) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.config.default_headers {
            insert_header(&mut headers, key, value)?;
        }
        if let Some(mime) = request.accept.mime() {
            headers.insert(ACCEPT, HeaderValue::from_static(mime));
        }
        if let Some(body) = &request.body {
            insert_header(&mut headers, CONTENT_TYPE.as_str(), body.content_type())?;
        }
        for (key, value) in &request.headers {
            insert_header(&mut headers, key, value)?;
        }
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, key: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(key.as_bytes())
        .map_err(|e| Error::invalid_request(format!("invalid header name '{key}': {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| Error::invalid_request(format!("invalid value for header '{key}': {e}")))?;
    headers.insert(name, value);
    Ok(())
}

/// Decode a 2xx response into `T`.
///
/// The body kind is taken from the response `Content-Type`, falling back to
/// `fallback`. A decode failure keeps the response in the returned error.
pub fn decode_response<T: DeserializeOwned>(
    response: Response,
    fallback: ContentKind,
) -> Result<ApiResponse<T>> {
    let kind = response.content_kind().unwrap_or(fallback);
    match codec::decode::<T>(kind, &response.body) {
        Ok(data) => Ok(ApiResponse { response, data }),
        Err(e) => Err(e.with_response(response)),
    }
}

/// Sleep for `delay` unless cancelled first
pub(crate) async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url.as_str())
            .field("config", &self.config)
            .field("has_session", &self.session.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
