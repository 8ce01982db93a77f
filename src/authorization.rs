//! Per-request tenant authorization.
//!
//! A request is allowed when its URI is on the tenant-agnostic bypass list or
//! when the caller-supplied tenant identity matches a tenant under management.
//! Exclusions do not take part: a hidden tenant is still addressable.

use crate::storage::ExclusionStore;
use crate::tenant::{TenantDirectory, TenantSource, tenant_matches};
use log::{debug, warn};
use std::sync::Arc;

/// URI pattern that skips the tenant check. Patterns are matched lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassRule {
    Contains(String),
    Equals(String),
}

impl BypassRule {
    pub fn contains(pattern: impl Into<String>) -> Self {
        BypassRule::Contains(pattern.into().to_lowercase())
    }

    pub fn equals(pattern: impl Into<String>) -> Self {
        BypassRule::Equals(pattern.into().to_lowercase())
    }

    /// `uri` must already be lowercase.
    fn matches_lowercase(&self, uri: &str) -> bool {
        match self {
            BypassRule::Contains(pattern) => uri.contains(pattern.as_str()),
            BypassRule::Equals(pattern) => uri == pattern,
        }
    }
}

/// Default bypass list for a Graph base URL: contract listing, customer
/// relationships, send-mail and managed-tenant relationships.
pub fn default_bypass_rules(graph_base: &str) -> Vec<BypassRule> {
    let graph = graph_base.trim_end_matches('/');
    vec![
        BypassRule::contains(format!("{}/beta/contracts", graph)),
        BypassRule::contains("/customers/"),
        BypassRule::equals(format!("{}/v1.0/me/sendmail", graph)),
        BypassRule::contains(format!("{}/beta/tenantrelationships/managedtenants", graph)),
    ]
}

/// Whether `uri` is covered by any rule.
pub fn is_bypassed(rules: &[BypassRule], uri: &str) -> bool {
    let uri = uri.to_lowercase();
    rules.iter().any(|rule| rule.matches_lowercase(&uri))
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// URI is tenant-agnostic.
    Bypass,
    /// Tenant is under management.
    Tenant,
    Denied,
}

impl AuthDecision {
    pub fn is_allowed(self) -> bool {
        !matches!(self, AuthDecision::Denied)
    }
}

/// Decides whether a tenant/URI pair may be acted on.
#[derive(Debug)]
pub struct AuthorizationGate<S, E> {
    directory: Arc<TenantDirectory<S, E>>,
    bypass: Vec<BypassRule>,
}

impl<S, E> Clone for AuthorizationGate<S, E> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            bypass: self.bypass.clone(),
        }
    }
}

impl<S: TenantSource, E: ExclusionStore> AuthorizationGate<S, E> {
    pub fn new(directory: Arc<TenantDirectory<S, E>>, bypass: Vec<BypassRule>) -> Self {
        Self { directory, bypass }
    }

    /// Gate with the default bypass list for `graph_base`.
    pub fn for_graph(directory: Arc<TenantDirectory<S, E>>, graph_base: &str) -> Self {
        Self::new(directory, default_bypass_rules(graph_base))
    }

    pub fn with_bypass_rule(mut self, rule: BypassRule) -> Self {
        self.bypass.push(rule);
        self
    }

    pub fn bypass_rules(&self) -> &[BypassRule] {
        &self.bypass
    }

    pub fn directory(&self) -> &Arc<TenantDirectory<S, E>> {
        &self.directory
    }

    /// Decide for `tenant` and `uri`. Fails closed when the directory cannot
    /// be loaded.
    pub async fn is_authorized(&self, tenant: &str, uri: &str) -> AuthDecision {
        if is_bypassed(&self.bypass, uri) {
            debug!("Bypassing tenant check for {}", uri);
            return AuthDecision::Bypass;
        }

        match self.directory.all_tenants().await {
            Ok(records) if tenant_matches(&records, tenant) => AuthDecision::Tenant,
            Ok(_) => AuthDecision::Denied,
            Err(err) => {
                warn!(
                    "Tenant directory unavailable, denying tenant {}: {}",
                    tenant, err
                );
                AuthDecision::Denied
            }
        }
    }
}
