//! Configuration for the partner request layer.
//!
//! All secrets and endpoints are injected through a [`CoreConfig`] value at
//! construction time; nothing is read from process-wide state after that.
//! Hosts either build the value explicitly or load it from environment
//! variables.
//!
//! # Example
//!
//! ```rust
//! use partner_graph::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .application_id("00000000-0000-0000-0000-000000000001")
//!     .application_secret("app-secret")
//!     .tenant_id("msp.onmicrosoft.com")
//!     .refresh_token("operator-refresh-token")
//!     .exchange_refresh_token("exchange-refresh-token")
//!     .tenant_cache_ttl(Duration::from_secs(300))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.credentials().tenant_id(), "msp.onmicrosoft.com");
//! ```
//!
//! # Environment variables
//!
//! [`CoreConfig::from_env`] reads the following (prefix `PARTNER_GRAPH_`):
//!
//! | Variable | Required | Meaning |
//! |---|---|---|
//! | `APPLICATION_ID` | yes | Operator application (client) id |
//! | `APPLICATION_SECRET` | yes | Operator application secret |
//! | `TENANT_ID` | yes | Operator's own tenant |
//! | `REFRESH_TOKEN` | yes | Operator delegated refresh token |
//! | `EXCHANGE_REFRESH_TOKEN` | no | Refresh token for Exchange and classic APIs |
//! | `DATA_DIR` | no | Directory for the exclusion database (default `data`) |
//! | `CACHE_DIR` | no | Directory for the tenant cache (default `<DATA_DIR>/cache`) |
//! | `TENANT_CACHE_TTL_SECS` | no | Tenant cache freshness window (default 420) |
//! | `REQUEST_TIMEOUT_SECS` | no | Outbound HTTP timeout (default 30) |
//! | `TOKEN_CACHE` | no | `false` disables token reuse |

use crate::error::{GraphError, GraphResult};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "PARTNER_GRAPH_";

/// Default freshness window of the tenant cache file.
pub const DEFAULT_TENANT_CACHE_TTL: Duration = Duration::from_secs(7 * 60);

/// Default timeout applied to every outbound request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default grace period before token expiry at which a cached token is renewed.
pub const DEFAULT_TOKEN_GRACE_PERIOD: Duration = Duration::from_secs(5 * 60);

/// File name of the tenant cache inside the cache directory.
pub const TENANT_CACHE_FILE: &str = "tenants.cache.json";

/// File name of the exclusion database inside the data directory.
pub const EXCLUSION_DB_FILE: &str = "excluded_tenants.db";

/// Base URLs of every upstream service.
///
/// Overridable so that tests can point the whole layer at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Identity provider, e.g. `https://login.microsoftonline.com`
    pub login: String,
    /// Microsoft Graph, e.g. `https://graph.microsoft.com`
    pub graph: String,
    /// Exchange Online, e.g. `https://outlook.office365.com`
    pub exchange: String,
    /// Classic admin center, e.g. `https://admin.microsoft.com`
    pub classic_admin: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "https://login.microsoftonline.com".to_string(),
            graph: "https://graph.microsoft.com".to_string(),
            exchange: "https://outlook.office365.com".to_string(),
            classic_admin: "https://admin.microsoft.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at the same base URL (mock servers).
    pub fn all_at(base: impl Into<String>) -> Self {
        let base = trim_base(base.into());
        Self {
            login: base.clone(),
            graph: base.clone(),
            exchange: base.clone(),
            classic_admin: base,
        }
    }

    fn validate(&self) -> GraphResult<()> {
        for (name, value) in [
            ("login", &self.login),
            ("graph", &self.graph),
            ("exchange", &self.exchange),
            ("classic_admin", &self.classic_admin),
        ] {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(GraphError::configuration(format!(
                    "endpoint '{}' must be an http(s) URL, got '{}'",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Operator credentials. Treated as opaque strings.
#[derive(Debug)]
pub struct Credentials {
    application_id: String,
    application_secret: SecretString,
    tenant_id: String,
    refresh_token: SecretString,
    exchange_refresh_token: Option<SecretString>,
}

impl Credentials {
    /// Operator application (client) id.
    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Operator's own tenant id or domain.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub(crate) fn application_secret(&self) -> &str {
        self.application_secret.expose_secret()
    }

    pub(crate) fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    /// Refresh token for Exchange and classic resources, falling back to the
    /// operator refresh token when none was configured.
    pub(crate) fn exchange_refresh_token(&self) -> &str {
        self.exchange_refresh_token
            .as_ref()
            .map(|t| t.expose_secret())
            .unwrap_or_else(|| self.refresh_token())
    }

    /// Whether a dedicated Exchange refresh token was configured.
    pub fn has_exchange_refresh_token(&self) -> bool {
        self.exchange_refresh_token.is_some()
    }
}

/// Token reuse settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCacheSettings {
    /// Reuse tokens until they are within `grace_period` of expiry.
    pub enabled: bool,
    /// Renew this long before the token actually expires.
    pub grace_period: Duration,
}

impl Default for TokenCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            grace_period: DEFAULT_TOKEN_GRACE_PERIOD,
        }
    }
}

/// Complete configuration consumed by the core.
#[derive(Debug)]
pub struct CoreConfig {
    credentials: Credentials,
    endpoints: Endpoints,
    data_dir: PathBuf,
    cache_dir: PathBuf,
    tenant_cache_ttl: Duration,
    request_timeout: Duration,
    token_cache: TokenCacheSettings,
}

impl CoreConfig {
    /// Start building a configuration.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Load configuration from `PARTNER_GRAPH_*` environment variables.
    pub fn from_env() -> GraphResult<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Load configuration from environment variables with a custom prefix.
    pub fn from_env_with_prefix(prefix: &str) -> GraphResult<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(prefix: &str, lookup: F) -> GraphResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", prefix, name)).filter(|v| !v.is_empty());
        let secs = |name: &str| -> GraphResult<Option<Duration>> {
            get(name)
                .map(|raw| {
                    raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                        GraphError::configuration(format!(
                            "{}{} must be a whole number of seconds, got '{}'",
                            prefix, name, raw
                        ))
                    })
                })
                .transpose()
        };

        let mut builder = CoreConfig::builder();
        if let Some(v) = get("APPLICATION_ID") {
            builder = builder.application_id(v);
        }
        if let Some(v) = get("APPLICATION_SECRET") {
            builder = builder.application_secret(v);
        }
        if let Some(v) = get("TENANT_ID") {
            builder = builder.tenant_id(v);
        }
        if let Some(v) = get("REFRESH_TOKEN") {
            builder = builder.refresh_token(v);
        }
        if let Some(v) = get("EXCHANGE_REFRESH_TOKEN") {
            builder = builder.exchange_refresh_token(v);
        }
        if let Some(v) = get("DATA_DIR") {
            builder = builder.data_dir(v);
        }
        if let Some(v) = get("CACHE_DIR") {
            builder = builder.cache_dir(v);
        }
        if let Some(ttl) = secs("TENANT_CACHE_TTL_SECS")? {
            builder = builder.tenant_cache_ttl(ttl);
        }
        if let Some(timeout) = secs("REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout(timeout);
        }
        if let Some(raw) = get("TOKEN_CACHE") {
            let enabled = raw.parse::<bool>().map_err(|_| {
                GraphError::configuration(format!(
                    "{}TOKEN_CACHE must be true or false, got '{}'",
                    prefix, raw
                ))
            })?;
            builder = builder.token_cache_enabled(enabled);
        }

        builder.build()
    }

    /// Operator credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Upstream base URLs.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Directory holding durable state (exclusion database).
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding the tenant cache file.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Full path of the tenant cache file.
    pub fn tenant_cache_file(&self) -> PathBuf {
        self.cache_dir.join(TENANT_CACHE_FILE)
    }

    /// Full path of the exclusion database.
    pub fn exclusion_db_file(&self) -> PathBuf {
        self.data_dir.join(EXCLUSION_DB_FILE)
    }

    /// Freshness window of the tenant cache.
    pub fn tenant_cache_ttl(&self) -> Duration {
        self.tenant_cache_ttl
    }

    /// Timeout applied to outbound requests.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Token reuse settings.
    pub fn token_cache(&self) -> TokenCacheSettings {
        self.token_cache
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    application_id: Option<String>,
    application_secret: Option<String>,
    tenant_id: Option<String>,
    refresh_token: Option<String>,
    exchange_refresh_token: Option<String>,
    endpoints: Option<Endpoints>,
    data_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    tenant_cache_ttl: Option<Duration>,
    request_timeout: Option<Duration>,
    token_cache: TokenCacheSettings,
}

impl CoreConfigBuilder {
    pub fn application_id(mut self, value: impl Into<String>) -> Self {
        self.application_id = Some(value.into());
        self
    }

    pub fn application_secret(mut self, value: impl Into<String>) -> Self {
        self.application_secret = Some(value.into());
        self
    }

    pub fn tenant_id(mut self, value: impl Into<String>) -> Self {
        self.tenant_id = Some(value.into());
        self
    }

    pub fn refresh_token(mut self, value: impl Into<String>) -> Self {
        self.refresh_token = Some(value.into());
        self
    }

    pub fn exchange_refresh_token(mut self, value: impl Into<String>) -> Self {
        self.exchange_refresh_token = Some(value.into());
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Defaults to `<data_dir>/cache` when unset.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn tenant_cache_ttl(mut self, ttl: Duration) -> Self {
        self.tenant_cache_ttl = Some(ttl);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn token_cache_enabled(mut self, enabled: bool) -> Self {
        self.token_cache.enabled = enabled;
        self
    }

    pub fn token_grace_period(mut self, grace: Duration) -> Self {
        self.token_cache.grace_period = grace;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> GraphResult<CoreConfig> {
        let application_id = required(self.application_id, "application_id")?;
        let application_secret = required(self.application_secret, "application_secret")?;
        let tenant_id = required(self.tenant_id, "tenant_id")?;
        let refresh_token = required(self.refresh_token, "refresh_token")?;

        let mut endpoints = self.endpoints.unwrap_or_default();
        endpoints.login = trim_base(endpoints.login);
        endpoints.graph = trim_base(endpoints.graph);
        endpoints.exchange = trim_base(endpoints.exchange);
        endpoints.classic_admin = trim_base(endpoints.classic_admin);
        endpoints.validate()?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        if request_timeout.is_zero() {
            return Err(GraphError::configuration(
                "request_timeout must be greater than zero",
            ));
        }

        let data_dir = self.data_dir.unwrap_or_else(|| PathBuf::from("data"));
        let cache_dir = self.cache_dir.unwrap_or_else(|| data_dir.join("cache"));

        Ok(CoreConfig {
            credentials: Credentials {
                application_id,
                application_secret: SecretString::from(application_secret),
                tenant_id,
                refresh_token: SecretString::from(refresh_token),
                exchange_refresh_token: self
                    .exchange_refresh_token
                    .filter(|t| !t.is_empty())
                    .map(SecretString::from),
            },
            endpoints,
            data_dir,
            cache_dir,
            tenant_cache_ttl: self.tenant_cache_ttl.unwrap_or(DEFAULT_TENANT_CACHE_TTL),
            request_timeout,
            token_cache: self.token_cache,
        })
    }
}

fn required(value: Option<String>, name: &str) -> GraphResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(GraphError::configuration(format!("{} is required", name))),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
