use super::dto::{ClassicRequest, ExoCommand, GraphRequest};
use super::outcome::RequestOutcome;
use super::transport::Transport;
use crate::audit::{AuditEntry, AuditSeverity, AuditSink};
use crate::authorization::AuthorizationGate;
use crate::error::GraphResult;
use crate::principal::SYSTEM_ACTOR;
use crate::storage::ExclusionStore;
use crate::tenant::TenantSource;
use log::info;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Message recorded when a request names a tenant outside the managed set.
pub const ACCESS_DENIED_MESSAGE: &str =
    "Not allowed. You cannot manage your own tenant or tenants not under your scope";

/// Authorised request execution.
///
/// Every call is checked against the [`AuthorizationGate`] before any token is
/// requested, so a denied call sends nothing upstream. Denials and upstream
/// failures are reported to the audit sink.
pub struct GraphExecutor<S, E> {
    gate: AuthorizationGate<S, E>,
    transport: Transport,
    audit: Arc<dyn AuditSink>,
}

impl<S, E> Clone for GraphExecutor<S, E> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            transport: self.transport.clone(),
            audit: Arc::clone(&self.audit),
        }
    }
}

impl<S: TenantSource, E: ExclusionStore> GraphExecutor<S, E> {
    pub fn new(
        gate: AuthorizationGate<S, E>,
        transport: Transport,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            gate,
            transport,
            audit,
        }
    }

    pub fn gate(&self) -> &AuthorizationGate<S, E> {
        &self.gate
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// GET a Graph collection on behalf of a tenant, following pagination.
    ///
    /// The payload holds one element per page: the page's `value`, or the
    /// whole body when it has none.
    pub async fn graph_get(
        &self,
        request: &GraphRequest,
    ) -> GraphResult<RequestOutcome<Vec<Value>>> {
        let uri = self.transport.graph_uri(&request.uri);
        let actor = request.actor.as_deref();
        if let Some(denied) = self.authorize(&request.tenant, &uri, "graph_get", actor).await {
            return Ok(denied);
        }

        let outcome = self.transport.graph_get(request).await?;
        self.audit_outcome(&outcome, &request.tenant, "graph_get", actor);
        Ok(outcome)
    }

    /// Send a single Graph request with a JSON body (POST, PATCH, PUT, DELETE).
    pub async fn graph_post<B: Serialize + ?Sized>(
        &self,
        request: &GraphRequest,
        body: &B,
        method: Method,
    ) -> GraphResult<RequestOutcome<Value>> {
        let uri = self.transport.graph_uri(&request.uri);
        let actor = request.actor.as_deref();
        if let Some(denied) = self.authorize(&request.tenant, &uri, "graph_post", actor).await {
            return Ok(denied);
        }

        let body = serde_json::to_value(body)?;
        let outcome = self.transport.graph_send(request, method, &body).await?;
        self.audit_outcome(&outcome, &request.tenant, "graph_post", actor);
        Ok(outcome)
    }

    /// GET a classic admin API collection, following `NextLink`.
    pub async fn classic_get(
        &self,
        request: &ClassicRequest,
    ) -> GraphResult<RequestOutcome<Vec<Value>>> {
        let uri = self.transport.classic_uri(&request.uri);
        let actor = request.actor.as_deref();
        if let Some(denied) = self.authorize(&request.tenant, &uri, "classic_get", actor).await {
            return Ok(denied);
        }

        let outcome = self.transport.classic_get(request).await?;
        self.audit_outcome(&outcome, &request.tenant, "classic_get", actor);
        Ok(outcome)
    }

    /// Send a single classic admin API request with a JSON body.
    pub async fn classic_post<B: Serialize + ?Sized>(
        &self,
        request: &ClassicRequest,
        body: &B,
        method: Method,
    ) -> GraphResult<RequestOutcome<Value>> {
        let uri = self.transport.classic_uri(&request.uri);
        let actor = request.actor.as_deref();
        if let Some(denied) = self.authorize(&request.tenant, &uri, "classic_post", actor).await {
            return Ok(denied);
        }

        let body = serde_json::to_value(body)?;
        let outcome = self.transport.classic_send(request, method, &body).await?;
        self.audit_outcome(&outcome, &request.tenant, "classic_post", actor);
        Ok(outcome)
    }

    /// GET from the Teams admin API.
    pub async fn teams_get(
        &self,
        uri: impl Into<String>,
        tenant: impl Into<String>,
    ) -> GraphResult<RequestOutcome<Vec<Value>>> {
        self.classic_get(&ClassicRequest::teams(uri, tenant)).await
    }

    /// Invoke an Exchange Online cmdlet in `tenant` and return the response `value`.
    pub async fn exo_invoke(
        &self,
        tenant: &str,
        command: &ExoCommand,
    ) -> GraphResult<RequestOutcome<Value>> {
        let uri = self.transport.exchange_invoke_uri(tenant);
        if let Some(denied) = self.authorize(tenant, &uri, "exo_invoke", None).await {
            return Ok(denied);
        }

        let customer_id = match self.gate.directory().find(tenant).await? {
            Some(record) => record.customer_id,
            None => return Ok(self.deny(tenant, "exo_invoke", None)),
        };

        info!(
            "Invoking {} in tenant {} ({})",
            command.cmdlet_name(),
            tenant,
            customer_id
        );
        let outcome = self
            .transport
            .exo_invoke(tenant, &customer_id, command)
            .await?;
        self.audit_outcome(&outcome, tenant, "exo_invoke", None);
        Ok(outcome)
    }

    async fn authorize<T>(
        &self,
        tenant: &str,
        uri: &str,
        api: &str,
        actor: Option<&str>,
    ) -> Option<RequestOutcome<T>> {
        if self.gate.is_authorized(tenant, uri).await.is_allowed() {
            None
        } else {
            Some(self.deny(tenant, api, actor))
        }
    }

    fn deny<T>(&self, tenant: &str, api: &str, actor: Option<&str>) -> RequestOutcome<T> {
        self.audit.record(
            AuditEntry::new(AuditSeverity::Warning, ACCESS_DENIED_MESSAGE, tenant, api)
                .with_username(actor.unwrap_or(SYSTEM_ACTOR)),
        );
        RequestOutcome::Denied {
            tenant: tenant.to_string(),
        }
    }

    fn audit_outcome<T>(
        &self,
        outcome: &RequestOutcome<T>,
        tenant: &str,
        api: &str,
        actor: Option<&str>,
    ) {
        let message = match outcome {
            RequestOutcome::Completed(_) | RequestOutcome::Denied { .. } => return,
            RequestOutcome::Partial { failure, .. } => format!(
                "Incomplete result: HTTP {} from {}: {}",
                failure.status, failure.uri, failure.message
            ),
            RequestOutcome::Failed(failure) => format!(
                "HTTP {} from {}: {}",
                failure.status, failure.uri, failure.message
            ),
            RequestOutcome::TokenUnavailable { status, .. } => {
                format!("Token acquisition failed with HTTP {}", status)
            }
        };
        self.audit.record(
            AuditEntry::new(AuditSeverity::Error, message, tenant, api)
                .with_username(actor.unwrap_or(SYSTEM_ACTOR)),
        );
    }
}
