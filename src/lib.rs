//! Multi-tenant authenticated request layer for Microsoft 365 partner tooling.
//!
//! Lets a managed-service-provider operator call Microsoft Graph and the
//! classic admin APIs on behalf of the tenants it manages, while confining
//! every request to that managed set.
//!
//! # Core Components
//!
//! - [`TokenProvider`] - OAuth2 tokens under app-only, delegated,
//!   cross-application and classic flows
//! - [`TenantDirectory`] - the managed tenant set behind a TTL file cache
//! - [`ExclusionStore`] - tenants hidden from listings
//! - [`AuthorizationGate`] - per-request tenant check with a bypass list
//! - [`GraphExecutor`] - authorised, paginated Graph and classic requests
//! - [`PartnerCore`] - all of the above wired from one [`CoreConfig`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use partner_graph::{CoreConfig, PartnerCore, TenantQuery};
//! use partner_graph::request::{GraphRequest, RequestOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let core = PartnerCore::open(CoreConfig::from_env()?).await?;
//!
//! for tenant in core.get_tenants(TenantQuery::default()).await? {
//!     let request = GraphRequest::new("/v1.0/users?$top=999", &tenant.default_domain_name);
//!     match core.executor().graph_get(&request).await? {
//!         RequestOutcome::Completed(pages) => {
//!             println!("{}: {} pages", tenant.display_name, pages.len())
//!         }
//!         other => println!("{}: HTTP {}", tenant.display_name, other.http_status()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod authorization;
pub mod config;
pub mod error;
pub mod partner;
pub mod principal;
pub mod request;
pub mod storage;
pub mod tenant;
pub mod token;

// Re-export commonly used types for convenience
pub use audit::{AuditEntry, AuditSeverity, AuditSink, LogAuditSink, MemoryAuditSink};
pub use authorization::{AuthDecision, AuthorizationGate, BypassRule};
pub use config::{CoreConfig, CoreConfigBuilder, Endpoints};
pub use error::{GraphError, GraphResult, normalize_error};
pub use partner::{GraphTenantDirectory, PartnerCore};
pub use principal::ClientPrincipal;
pub use request::{
    ClassicRequest, ExoCommand, GraphExecutor, GraphRequest, RequestOutcome, Transport,
    UpstreamFailure,
};
pub use storage::{ExcludedTenant, ExclusionStore, InMemoryExclusionStore, StorageError};
#[cfg(feature = "sqlite")]
pub use storage::SqliteExclusionStore;
pub use tenant::{GraphTenantSource, TenantDirectory, TenantQuery, TenantRecord, TenantSource};
pub use token::{GrantFlow, GraphTokenParams, TokenProvider, TokenSet};
