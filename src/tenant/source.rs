use super::record::TenantRecord;
use crate::error::{GraphError, GraphResult};
use crate::request::{GraphRequest, RequestOutcome, Transport, flatten_pages};
use log::warn;
use std::future::Future;

/// Path and query of the contracts listing under the Graph base URL.
pub const CONTRACTS_LISTING: &str =
    "/beta/contracts?$select=customerId,defaultDomainName,displayName&$top=999";

/// Upstream listing of every tenant under management.
pub trait TenantSource: Send + Sync {
    /// Fetch the full, unfiltered population in upstream order.
    fn fetch_tenants(&self) -> impl Future<Output = GraphResult<Vec<TenantRecord>>> + Send;
}

/// Lists tenants from the Graph contracts endpoint as the operator.
#[derive(Debug, Clone)]
pub struct GraphTenantSource {
    transport: Transport,
}

impl GraphTenantSource {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    fn listing_uri(&self) -> String {
        format!("{}{}", self.transport.endpoints().graph, CONTRACTS_LISTING)
    }
}

impl TenantSource for GraphTenantSource {
    async fn fetch_tenants(&self) -> GraphResult<Vec<TenantRecord>> {
        // An empty tenant id resolves to the operator's own tenant
        let request = GraphRequest::new(self.listing_uri(), "");

        match self.transport.graph_get(&request).await? {
            RequestOutcome::Completed(pages) => Ok(flatten_pages(pages)
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<TenantRecord>(item) {
                    Ok(record) => Some(record),
                    Err(err) => {
                        warn!("Skipping unreadable contract in tenant listing: {}", err);
                        None
                    }
                })
                .collect()),
            // A partial listing would shrink the authorised set
            RequestOutcome::Partial { failure, .. } | RequestOutcome::Failed(failure) => {
                Err(GraphError::upstream(failure.uri, failure.status))
            }
            RequestOutcome::TokenUnavailable { tenant, status } => {
                Err(GraphError::token_acquisition(tenant, "list_tenants", status))
            }
            RequestOutcome::Denied { tenant } => Err(GraphError::denied(tenant)),
        }
    }
}
