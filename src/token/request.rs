//! Grant-flow selection and token request forms.
//!
//! Everything here is pure: a [`TokenRequest`] can be resolved and its form
//! body inspected without any network access.

use crate::config::Credentials;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Default Graph scope.
pub const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Scope alias that selects the Exchange Online application.
pub const EXCHANGE_SCOPE_ALIAS: &str = "exchangeonline";

/// Well-known multi-tenant Exchange Online application id.
pub const EXCHANGE_APP_ID: &str = "a0c73c16-a7e3-4564-9a95-2bdf47383716";

/// Scope requested for the Exchange Online application.
pub const EXCHANGE_SCOPE: &str = "https://outlook.office365.com/.default";

/// OAuth2 grant flow used for a token request.
#[derive(Debug)]
pub enum GrantFlow {
    /// App-only, operator application id and secret.
    ClientCredentials,
    /// Delegated, operator application plus operator refresh token.
    OperatorRefresh,
    /// Delegated, caller-supplied application id and refresh token.
    CrossApplication {
        app_id: String,
        refresh_token: SecretString,
    },
    /// Legacy v1 endpoint with a `resource`, using the Exchange refresh token.
    ClassicRefresh,
}

impl GrantFlow {
    /// Choose the flow for a Graph token request.
    ///
    /// A non-empty `app_id` together with a non-empty `refresh_token` always
    /// wins; otherwise `as_app` picks between app-only and delegated.
    pub fn select(as_app: bool, app_id: Option<&str>, refresh_token: Option<&str>) -> Self {
        match (non_empty(app_id), non_empty(refresh_token)) {
            (Some(app_id), Some(refresh_token)) => GrantFlow::CrossApplication {
                app_id: app_id.to_string(),
                refresh_token: SecretString::from(refresh_token.to_string()),
            },
            _ if as_app => GrantFlow::ClientCredentials,
            _ => GrantFlow::OperatorRefresh,
        }
    }

    /// Short name used in logs and cache keys.
    pub fn name(&self) -> &'static str {
        match self {
            GrantFlow::ClientCredentials => "client_credentials",
            GrantFlow::OperatorRefresh => "operator_refresh",
            GrantFlow::CrossApplication { .. } => "cross_application",
            GrantFlow::ClassicRefresh => "classic_refresh",
        }
    }

    fn cache_discriminator(&self) -> String {
        match self {
            GrantFlow::CrossApplication {
                app_id,
                refresh_token,
            } => format!(
                "{}:{}:{}",
                self.name(),
                app_id,
                fingerprint(refresh_token.expose_secret())
            ),
            _ => self.name().to_string(),
        }
    }
}

/// What the token is for: a v2 `scope` or a v1 `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Audience {
    Scope(String),
    Resource(String),
}

impl Audience {
    pub fn as_str(&self) -> &str {
        match self {
            Audience::Scope(s) | Audience::Resource(s) => s,
        }
    }
}

/// Caller-facing parameters of a Graph token request.
///
/// ```rust
/// use partner_graph::token::GraphTokenParams;
///
/// let params = GraphTokenParams::for_tenant("contoso.com")
///     .as_app(true)
///     .scope("https://graph.microsoft.com/.default");
/// ```
#[derive(Debug, Default)]
pub struct GraphTokenParams {
    pub(crate) tenant_id: String,
    pub(crate) as_app: bool,
    pub(crate) app_id: Option<String>,
    pub(crate) refresh_token: Option<SecretString>,
    pub(crate) scope: Option<String>,
    pub(crate) full_response: bool,
}

impl GraphTokenParams {
    /// An empty tenant id means the operator's own tenant.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }

    pub fn as_app(mut self, as_app: bool) -> Self {
        self.as_app = as_app;
        self
    }

    /// Use a different application's refresh token.
    pub fn cross_application(
        mut self,
        app_id: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        self.app_id = Some(app_id.into());
        self.refresh_token = Some(SecretString::from(refresh_token.into()));
        self
    }

    /// Scope to request; `exchangeonline` selects the Exchange application.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Return every top-level field of the token response instead of only
    /// `Authorization`.
    pub fn full_response(mut self) -> Self {
        self.full_response = true;
        self
    }
}

/// A fully resolved token request.
#[derive(Debug)]
pub struct TokenRequest {
    tenant: String,
    flow: GrantFlow,
    audience: Audience,
}

impl TokenRequest {
    /// Resolve a Graph token request: default tenant, scope alias and flow.
    pub fn graph(credentials: &Credentials, params: &GraphTokenParams) -> Self {
        let tenant = resolve_tenant(credentials, &params.tenant_id);
        let requested_scope = non_empty(params.scope.as_deref()).unwrap_or(DEFAULT_GRAPH_SCOPE);

        if requested_scope.eq_ignore_ascii_case(EXCHANGE_SCOPE_ALIAS) {
            return Self {
                tenant,
                flow: GrantFlow::CrossApplication {
                    app_id: EXCHANGE_APP_ID.to_string(),
                    refresh_token: SecretString::from(
                        credentials.exchange_refresh_token().to_string(),
                    ),
                },
                audience: Audience::Scope(EXCHANGE_SCOPE.to_string()),
            };
        }

        let flow = GrantFlow::select(
            params.as_app,
            params.app_id.as_deref(),
            params.refresh_token.as_ref().map(|t| t.expose_secret()),
        );

        Self {
            tenant,
            flow,
            audience: Audience::Scope(requested_scope.to_string()),
        }
    }

    /// Resolve a classic (v1, resource-based) token request.
    pub fn classic(credentials: &Credentials, tenant_id: &str, resource: &str) -> Self {
        Self {
            tenant: resolve_tenant(credentials, tenant_id),
            flow: GrantFlow::ClassicRefresh,
            audience: Audience::Resource(resource.to_string()),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn flow(&self) -> &GrantFlow {
        &self.flow
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    /// Operation name used in logs and errors.
    pub fn operation(&self) -> &'static str {
        match self.audience {
            Audience::Scope(_) => "acquire_graph_token",
            Audience::Resource(_) => "acquire_classic_token",
        }
    }

    /// Token endpoint under the given login base URL.
    pub fn endpoint(&self, login_base: &str) -> String {
        match self.audience {
            Audience::Scope(_) => format!("{}/{}/oauth2/v2.0/token", login_base, self.tenant),
            Audience::Resource(_) => format!("{}/{}/oauth2/token", login_base, self.tenant),
        }
    }

    /// Form body to post to [`endpoint`](Self::endpoint).
    pub fn form(&self, credentials: &Credentials) -> Vec<(&'static str, String)> {
        let audience = self.audience.as_str().to_string();
        match &self.flow {
            GrantFlow::ClientCredentials => vec![
                ("client_id", credentials.application_id().to_string()),
                ("client_secret", credentials.application_secret().to_string()),
                ("scope", audience),
                ("grant_type", "client_credentials".to_string()),
            ],
            GrantFlow::OperatorRefresh => vec![
                ("client_id", credentials.application_id().to_string()),
                ("client_secret", credentials.application_secret().to_string()),
                ("scope", audience),
                ("refresh_token", credentials.refresh_token().to_string()),
                ("grant_type", "refresh_token".to_string()),
            ],
            GrantFlow::CrossApplication {
                app_id,
                refresh_token,
            } => vec![
                ("client_id", app_id.clone()),
                ("refresh_token", refresh_token.expose_secret().to_string()),
                ("scope", audience),
                ("grant_type", "refresh_token".to_string()),
            ],
            GrantFlow::ClassicRefresh => vec![
                ("resource", audience),
                ("grant_type", "refresh_token".to_string()),
                (
                    "refresh_token",
                    credentials.exchange_refresh_token().to_string(),
                ),
            ],
        }
    }

    /// Key under which the resulting token may be reused.
    pub(crate) fn cache_key(&self) -> TokenKey {
        TokenKey {
            tenant: self.tenant.to_lowercase(),
            flow: self.flow.cache_discriminator(),
            audience: self.audience.clone(),
        }
    }
}

/// Cache key: (tenant, flow, scope/resource).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TokenKey {
    tenant: String,
    flow: String,
    audience: Audience,
}

fn resolve_tenant(credentials: &Credentials, tenant_id: &str) -> String {
    match non_empty(Some(tenant_id)) {
        Some(tenant) => tenant.to_string(),
        None => credentials.tenant_id().to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Short, non-reversible fingerprint so raw refresh tokens never sit in keys.
fn fingerprint(secret: &str) -> String {
    Sha256::digest(secret.as_bytes())
        .iter()
        .take(12)
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;

    fn config() -> CoreConfig {
        CoreConfig::builder()
            .application_id("operator-app")
            .application_secret("operator-secret")
            .tenant_id("msp.onmicrosoft.com")
            .refresh_token("operator-refresh")
            .exchange_refresh_token("exchange-refresh")
            .build()
            .unwrap()
    }

    fn field<'a>(form: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_as_app_selects_client_credentials() {
        let config = config();
        let request = TokenRequest::graph(
            config.credentials(),
            &GraphTokenParams::for_tenant("contoso.com").as_app(true),
        );
        let form = request.form(config.credentials());

        assert_eq!(request.flow().name(), "client_credentials");
        assert_eq!(field(&form, "grant_type"), Some("client_credentials"));
        assert_eq!(field(&form, "client_id"), Some("operator-app"));
        assert_eq!(field(&form, "client_secret"), Some("operator-secret"));
        assert_eq!(field(&form, "scope"), Some(DEFAULT_GRAPH_SCOPE));
        assert_eq!(field(&form, "refresh_token"), None);
    }

    #[test]
    fn test_delegated_uses_operator_refresh_token() {
        let config = config();
        let request = TokenRequest::graph(
            config.credentials(),
            &GraphTokenParams::for_tenant("contoso.com"),
        );
        let form = request.form(config.credentials());

        assert_eq!(field(&form, "grant_type"), Some("refresh_token"));
        assert_eq!(field(&form, "refresh_token"), Some("operator-refresh"));
        assert_eq!(field(&form, "client_secret"), Some("operator-secret"));
    }

    #[test]
    fn test_cross_application_overrides_as_app() {
        let config = config();
        let request = TokenRequest::graph(
            config.credentials(),
            &GraphTokenParams::for_tenant("contoso.com")
                .as_app(true)
                .cross_application("other-app", "other-refresh"),
        );
        let form = request.form(config.credentials());

        assert_eq!(request.flow().name(), "cross_application");
        assert_eq!(field(&form, "client_id"), Some("other-app"));
        assert_eq!(field(&form, "refresh_token"), Some("other-refresh"));
        assert_eq!(field(&form, "client_secret"), None);
    }

    #[test]
    fn test_cross_application_needs_both_values() {
        assert_eq!(
            GrantFlow::select(false, Some("other-app"), Some("")).name(),
            "operator_refresh"
        );
        assert_eq!(
            GrantFlow::select(true, None, Some("rt")).name(),
            "client_credentials"
        );
    }

    #[test]
    fn test_exchange_alias() {
        let config = config();
        let request = TokenRequest::graph(
            config.credentials(),
            &GraphTokenParams::for_tenant("contoso.com").scope("ExchangeOnline"),
        );
        let form = request.form(config.credentials());

        assert_eq!(field(&form, "client_id"), Some(EXCHANGE_APP_ID));
        assert_eq!(field(&form, "refresh_token"), Some("exchange-refresh"));
        assert_eq!(field(&form, "scope"), Some(EXCHANGE_SCOPE));
    }

    #[test]
    fn test_empty_tenant_falls_back_to_operator_tenant() {
        let config = config();
        let request = TokenRequest::graph(config.credentials(), &GraphTokenParams::for_tenant(""));
        assert_eq!(request.tenant(), "msp.onmicrosoft.com");
        assert_eq!(
            request.endpoint("https://login.example"),
            "https://login.example/msp.onmicrosoft.com/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_classic_request() {
        let config = config();
        let request = TokenRequest::classic(
            config.credentials(),
            "contoso.com",
            "https://admin.microsoft.com",
        );
        let form = request.form(config.credentials());

        assert_eq!(
            request.endpoint("https://login.example"),
            "https://login.example/contoso.com/oauth2/token"
        );
        assert_eq!(field(&form, "resource"), Some("https://admin.microsoft.com"));
        assert_eq!(field(&form, "refresh_token"), Some("exchange-refresh"));
        assert_eq!(field(&form, "client_id"), None);
    }

    #[test]
    fn test_cache_key_separates_flows_and_hides_tokens() {
        let config = config();
        let creds = config.credentials();
        let app = TokenRequest::graph(
            creds,
            &GraphTokenParams::for_tenant("contoso.com").as_app(true),
        );
        let delegated = TokenRequest::graph(creds, &GraphTokenParams::for_tenant("Contoso.com"));
        let delegated_again =
            TokenRequest::graph(creds, &GraphTokenParams::for_tenant("contoso.com"));
        let cross = TokenRequest::graph(
            creds,
            &GraphTokenParams::for_tenant("contoso.com").cross_application("x", "secret-rt"),
        );

        assert_ne!(app.cache_key(), delegated.cache_key());
        assert_eq!(delegated.cache_key(), delegated_again.cache_key());
        assert!(!format!("{:?}", cross.cache_key()).contains("secret-rt"));
    }
}
