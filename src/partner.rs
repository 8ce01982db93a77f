//! Assembled request layer.

use crate::audit::{AuditEntry, AuditSeverity, AuditSink, LogAuditSink};
use crate::authorization::AuthorizationGate;
use crate::config::CoreConfig;
use crate::error::GraphResult;
use crate::principal::ClientPrincipal;
use crate::request::{GraphExecutor, Transport};
use crate::storage::{ExcludedTenant, ExclusionStore};
use crate::tenant::{GraphTenantSource, TenantDirectory, TenantQuery, TenantRecord};
use crate::token::TokenProvider;
use log::info;
use std::sync::Arc;

/// Directory backed by the Graph contracts listing.
pub type GraphTenantDirectory<E> = TenantDirectory<GraphTenantSource, E>;

/// Config, HTTP client, token provider, tenant directory, gate and executor
/// wired together.
///
/// # Example
///
/// ```rust,no_run
/// use partner_graph::{CoreConfig, PartnerCore};
/// use partner_graph::request::GraphRequest;
/// use partner_graph::storage::InMemoryExclusionStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let core = PartnerCore::new(CoreConfig::from_env()?, InMemoryExclusionStore::new())?;
///
/// let users = core
///     .executor()
///     .graph_get(&GraphRequest::new("/v1.0/users", "contoso.onmicrosoft.com"))
///     .await?;
/// println!("{} pages", users.into_payload().len());
/// # Ok(())
/// # }
/// ```
pub struct PartnerCore<E> {
    config: Arc<CoreConfig>,
    tokens: TokenProvider,
    directory: Arc<GraphTenantDirectory<E>>,
    executor: GraphExecutor<GraphTenantSource, E>,
    audit: Arc<dyn AuditSink>,
}

impl<E: ExclusionStore> PartnerCore<E> {
    /// Build with audit entries going to the `log` facade.
    pub fn new(config: CoreConfig, exclusions: E) -> GraphResult<Self> {
        Self::with_audit_sink(config, exclusions, Arc::new(LogAuditSink))
    }

    pub fn with_audit_sink(
        config: CoreConfig,
        exclusions: E,
        audit: Arc<dyn AuditSink>,
    ) -> GraphResult<Self> {
        let config = Arc::new(config);
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let tokens = TokenProvider::new(http.clone(), Arc::clone(&config));
        let transport = Transport::new(http, tokens.clone(), config.endpoints().clone());
        let directory = Arc::new(TenantDirectory::from_config(
            GraphTenantSource::new(transport.clone()),
            exclusions,
            &config,
        ));
        let gate = AuthorizationGate::for_graph(Arc::clone(&directory), &config.endpoints().graph);
        let executor = GraphExecutor::new(gate, transport, Arc::clone(&audit));

        info!(
            "Partner request layer ready for operator tenant {} (tenant cache {})",
            config.credentials().tenant_id(),
            config.tenant_cache_file().display()
        );

        Ok(Self {
            config,
            tokens,
            directory,
            executor,
            audit,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    pub fn directory(&self) -> &Arc<GraphTenantDirectory<E>> {
        &self.directory
    }

    pub fn gate(&self) -> &AuthorizationGate<GraphTenantSource, E> {
        self.executor.gate()
    }

    pub fn executor(&self) -> &GraphExecutor<GraphTenantSource, E> {
        &self.executor
    }

    pub async fn get_tenants(&self, query: TenantQuery) -> GraphResult<Vec<TenantRecord>> {
        self.directory.get_tenants(query).await
    }

    /// Hide a tenant from filtered listings. Returns `false` if it was already hidden.
    pub async fn exclude(&self, domain: &str, username: &str) -> GraphResult<bool> {
        let inserted = self
            .directory
            .exclusions()
            .exclude(ExcludedTenant::new(domain, username))
            .await?;
        if inserted {
            self.audit.record(
                AuditEntry::new(
                    AuditSeverity::Info,
                    format!("Excluded tenant {}", domain),
                    domain,
                    "exclude_tenant",
                )
                .with_username(username),
            );
        }
        Ok(inserted)
    }

    /// [`exclude`](Self::exclude), taking the acting user from a principal header.
    pub async fn exclude_with_principal(
        &self,
        domain: &str,
        principal_header: Option<&str>,
    ) -> GraphResult<bool> {
        let username = ClientPrincipal::username_from_header(principal_header);
        self.exclude(domain, &username).await
    }

    /// Show a hidden tenant again. Returns `false` if it was not hidden.
    pub async fn include(&self, domain: &str) -> GraphResult<bool> {
        let removed = self.directory.exclusions().include(domain).await?;
        if removed {
            self.audit.record(AuditEntry::new(
                AuditSeverity::Info,
                format!("Included tenant {}", domain),
                domain,
                "include_tenant",
            ));
        }
        Ok(removed)
    }

    pub async fn list_excluded(&self) -> GraphResult<Vec<ExcludedTenant>> {
        Ok(self.directory.exclusions().list_excluded().await?)
    }
}

#[cfg(feature = "sqlite")]
impl PartnerCore<crate::storage::SqliteExclusionStore> {
    /// Build with exclusions persisted in `<data_dir>/excluded_tenants.db`.
    pub async fn open(config: CoreConfig) -> GraphResult<Self> {
        let store =
            crate::storage::SqliteExclusionStore::new_with_path(config.exclusion_db_file()).await?;
        Self::new(config, store)
    }
}
