//! Client configuration
//!
//! [`ClientConfig`] holds the instance address, the credentials for one of
//! the two authentication modes, and the tuning knobs for the session and
//! request executor. It is immutable once a client has been built.

use crate::error::{Error, Result};
use crate::http::ExecutorConfig;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

/// Default lead time before expiry at which a token is proactively refreshed
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(300);

// ============================================================================
// Credentials
// ============================================================================

/// How the client authenticates
#[derive(Clone)]
pub enum AuthMode {
    /// OAuth2 client-credentials exchange (API roles and clients)
    TokenExchange {
        /// API client identifier
        client_id: String,
        /// API client secret
        client_secret: SecretString,
    },
    /// Username and password exchanged for a bearer token
    Basic {
        /// Account username
        username: String,
        /// Account password
        password: SecretString,
    },
}

impl AuthMode {
    /// OAuth2 client credentials
    pub fn token_exchange(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::TokenExchange {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Username and password
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Short name used in logs and `AUTH_METHOD`
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::TokenExchange { .. } => "oauth2",
            AuthMode::Basic { .. } => "basic",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            AuthMode::TokenExchange {
                client_id,
                client_secret,
            } => {
                if client_id.trim().is_empty() {
                    return Err(Error::config("client_id is required for oauth2"));
                }
                if client_secret.expose_secret().is_empty() {
                    return Err(Error::config("client_secret is required for oauth2"));
                }
            }
            AuthMode::Basic { username, password } => {
                if username.trim().is_empty() {
                    return Err(Error::config("username is required for basic auth"));
                }
                if password.expose_secret().is_empty() {
                    return Err(Error::config("password is required for basic auth"));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::TokenExchange { client_id, .. } => f
                .debug_struct("TokenExchange")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
            AuthMode::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Instance address plus authentication mode
#[derive(Debug, Clone)]
pub struct Credentials {
    instance_url: Url,
    auth: AuthMode,
}

impl Credentials {
    /// Build credentials, normalizing the instance address.
    ///
    /// A bare domain gets `https://` and trailing slashes are trimmed.
    pub fn new(instance: &str, auth: AuthMode) -> Result<Self> {
        let trimmed = instance.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::config("instance domain is required"));
        }
        // The join base ends in exactly one slash so relative paths extend it
        let with_scheme = if trimmed.contains("://") {
            format!("{trimmed}/")
        } else {
            format!("https://{trimmed}/")
        };
        let instance_url = Url::parse(&with_scheme)?;
        if instance_url.host_str().is_none() {
            return Err(Error::config(format!("instance URL has no host: {instance}")));
        }
        auth.validate()?;
        Ok(Self { instance_url, auth })
    }

    /// Base address of the Jamf Pro instance
    pub fn instance_url(&self) -> &Url {
        &self.instance_url
    }

    /// Instance address without the trailing slash, as shown in logs
    pub fn instance_domain(&self) -> &str {
        self.instance_url.as_str().trim_end_matches('/')
    }

    /// Authentication mode
    pub fn auth(&self) -> &AuthMode {
        &self.auth
    }
}

// ============================================================================
// Session
// ============================================================================

/// When [`keep_alive`](crate::auth::SessionManager::keep_alive) refreshes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshMargin {
    /// Refresh when less than this much lifetime remains
    Fixed(Duration),
    /// Refresh when less than this fraction of the total lifetime remains
    Fraction(f64),
}

impl Default for RefreshMargin {
    fn default() -> Self {
        RefreshMargin::Fixed(DEFAULT_REFRESH_BUFFER)
    }
}

impl RefreshMargin {
    /// Margin for a token with the given total lifetime
    pub fn for_lifetime(self, lifetime: Duration) -> Duration {
        match self {
            RefreshMargin::Fixed(d) => d,
            RefreshMargin::Fraction(f) => lifetime.mul_f64(f.clamp(0.0, 1.0)),
        }
    }
}

/// Token lifecycle settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// A token is treated as expired this long before its recorded expiry
    pub expiry_skew: Duration,
    /// Keep-alive refresh threshold
    pub refresh_margin: RefreshMargin,
    /// Extend basic-auth tokens through the keep-alive endpoint
    pub use_keep_alive_endpoint: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_skew: Duration::from_secs(30),
            refresh_margin: RefreshMargin::default(),
            use_keep_alive_endpoint: true,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Full client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Instance address and auth mode
    pub credentials: Credentials,
    /// Token lifecycle settings
    pub session: SessionConfig,
    /// Retry, timeout and throttling settings
    pub executor: ExecutorConfig,
    /// Omit query strings from logs
    pub hide_sensitive_data: bool,
}

impl ClientConfig {
    /// Create a config with defaults for everything but the credentials
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            session: SessionConfig::default(),
            executor: ExecutorConfig::default(),
            hide_sensitive_data: false,
        }
    }

    /// Create a new config builder
    pub fn builder(instance: impl Into<String>, auth: AuthMode) -> ClientConfigBuilder {
        ClientConfigBuilder {
            instance: instance.into(),
            auth,
            session: SessionConfig::default(),
            executor: ExecutorConfig::default(),
            hide_sensitive_data: false,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `INSTANCE_DOMAIN`, `AUTH_METHOD` (`oauth2` or `basic`),
    /// `CLIENT_ID`, `CLIENT_SECRET`, `BASIC_AUTH_USERNAME`,
    /// `BASIC_AUTH_PASSWORD`, `TOKEN_REFRESH_BUFFER_SECONDS` and
    /// `HIDE_SENSITIVE_DATA`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let instance = get("INSTANCE_DOMAIN")
            .ok_or_else(|| Error::config("INSTANCE_DOMAIN is not set"))?;

        let method = get("AUTH_METHOD").unwrap_or_else(|| "oauth2".to_string());
        let auth = match method.to_ascii_lowercase().as_str() {
            "oauth2" => AuthMode::token_exchange(
                get("CLIENT_ID").unwrap_or_default(),
                get("CLIENT_SECRET").unwrap_or_default(),
            ),
            "basic" => AuthMode::basic(
                get("BASIC_AUTH_USERNAME").unwrap_or_default(),
                get("BASIC_AUTH_PASSWORD").unwrap_or_default(),
            ),
            other => {
                return Err(Error::config(format!(
                    "unsupported AUTH_METHOD '{other}', expected oauth2 or basic"
                )))
            }
        };

        let mut builder = ClientConfig::builder(instance, auth);

        if let Some(raw) = get("TOKEN_REFRESH_BUFFER_SECONDS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::config(format!("TOKEN_REFRESH_BUFFER_SECONDS must be an integer: {raw}"))
            })?;
            builder = builder.refresh_margin(RefreshMargin::Fixed(Duration::from_secs(secs)));
        }

        if let Some(raw) = get("HIDE_SENSITIVE_DATA") {
            let hide = matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
            builder = builder.hide_sensitive_data(hide);
        }

        builder.build()
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.session.expiry_skew >= Duration::from_secs(3600) {
            return Err(Error::config("expiry_skew must be under one hour"));
        }
        if let RefreshMargin::Fraction(f) = self.session.refresh_margin {
            if !(0.0..1.0).contains(&f) {
                return Err(Error::config("refresh margin fraction must be in [0, 1)"));
            }
        }
        self.executor.validate()
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug)]
pub struct ClientConfigBuilder {
    instance: String,
    auth: AuthMode,
    session: SessionConfig,
    executor: ExecutorConfig,
    hide_sensitive_data: bool,
}

impl ClientConfigBuilder {
    /// Set the keep-alive refresh threshold
    pub fn refresh_margin(mut self, margin: RefreshMargin) -> Self {
        self.session.refresh_margin = margin;
        self
    }

    /// Set the expiry skew
    pub fn expiry_skew(mut self, skew: Duration) -> Self {
        self.session.expiry_skew = skew;
        self
    }

    /// Enable or disable the keep-alive endpoint for basic auth
    pub fn use_keep_alive_endpoint(mut self, enabled: bool) -> Self {
        self.session.use_keep_alive_endpoint = enabled;
        self
    }

    /// Replace the executor settings
    pub fn executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Omit query strings from logs
    pub fn hide_sensitive_data(mut self, hide: bool) -> Self {
        self.hide_sensitive_data = hide;
        self
    }

    /// Build and validate the config
    pub fn build(self) -> Result<ClientConfig> {
        let config = ClientConfig {
            credentials: Credentials::new(&self.instance, self.auth)?,
            session: self.session,
            executor: self.executor,
            hide_sensitive_data: self.hide_sensitive_data,
        };
        config.validate()?;
        Ok(config)
    }
}
