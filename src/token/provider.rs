use super::cache::TokenCache;
use super::request::{GraphTokenParams, TokenRequest};
use super::set::TokenSet;
use crate::config::CoreConfig;
use crate::error::{GraphError, GraphResult};
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

/// Acquires bearer tokens from the identity provider.
///
/// Ordinary refusals from the token endpoint are returned as
/// [`GraphError::TokenAcquisition`]; only transport failures and non-JSON
/// bodies surface as other errors.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    http: reqwest::Client,
    config: Arc<CoreConfig>,
    cache: Option<Arc<TokenCache>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, config: Arc<CoreConfig>) -> Self {
        let settings = config.token_cache();
        let cache = settings
            .enabled
            .then(|| Arc::new(TokenCache::new(settings.grace_period)));
        Self {
            http,
            config,
            cache,
        }
    }

    /// Acquire a Graph token (v2 endpoint).
    pub async fn acquire_graph_token(&self, params: GraphTokenParams) -> GraphResult<TokenSet> {
        let request = TokenRequest::graph(self.config.credentials(), &params);
        self.acquire(&request, params.full_response).await
    }

    /// Acquire a classic token for `resource` (v1 endpoint, Exchange refresh token).
    pub async fn acquire_classic_token(
        &self,
        tenant_id: &str,
        resource: &str,
    ) -> GraphResult<TokenSet> {
        let request = TokenRequest::classic(self.config.credentials(), tenant_id, resource);
        self.acquire(&request, false).await
    }

    /// Acquire a token for an already resolved request.
    pub async fn acquire(
        &self,
        request: &TokenRequest,
        full_response: bool,
    ) -> GraphResult<TokenSet> {
        let project = |full: TokenSet| {
            if full_response {
                full
            } else {
                full.authorization_only()
            }
        };

        let Some(cache) = &self.cache else {
            return self.fetch(request).await.map(project);
        };

        let key = request.cache_key();
        if let Some(cached) = cache.get(&key).await {
            debug!(
                "Using cached {} token for tenant {}",
                request.flow().name(),
                request.tenant()
            );
            return Ok(project(cached));
        }

        let flight = cache.flight(&key);
        let result = {
            let _guard = flight.lock().await;

            // Another caller may have refreshed while we waited
            match cache.get(&key).await {
                Some(cached) => Ok(cached),
                None => match self.fetch(request).await {
                    Ok(fresh) => {
                        cache.insert(key.clone(), fresh.clone()).await;
                        Ok(fresh)
                    }
                    Err(err) => Err(err),
                },
            }
        };
        cache.release(&key, flight);

        result.map(project)
    }

    /// Drop every cached token.
    pub async fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }

    async fn fetch(&self, request: &TokenRequest) -> GraphResult<TokenSet> {
        let endpoint = request.endpoint(&self.config.endpoints().login);
        debug!(
            "Requesting {} token for tenant {} ({})",
            request.flow().name(),
            request.tenant(),
            request.audience().as_str()
        );

        let response = self
            .http
            .post(&endpoint)
            .form(&request.form(self.config.credentials()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "{} failed: tenant={} status={} uri={}",
                request.operation(),
                request.tenant(),
                status.as_u16(),
                endpoint
            );
            return Err(GraphError::token_acquisition(
                request.tenant(),
                request.operation(),
                status.as_u16(),
            ));
        }

        let body: Value = serde_json::from_slice(&response.bytes().await?)?;
        TokenSet::from_response(body, request.operation())
    }
}
