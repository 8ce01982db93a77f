//! Shared harness for integration tests.
//!
//! Every upstream (login, Graph, classic admin, Exchange) is served by one
//! wiremock server; local state lives in a temporary directory.

#![allow(dead_code)]

use partner_graph::config::CoreConfigBuilder;
use partner_graph::storage::InMemoryExclusionStore;
use partner_graph::{CoreConfig, Endpoints, MemoryAuditSink, PartnerCore, TenantRecord};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OPERATOR_TENANT: &str = "msp.onmicrosoft.com";
pub const APP_ID: &str = "00000000-0000-0000-0000-00000000a991";
pub const APP_SECRET: &str = "operator-secret";
pub const OPERATOR_REFRESH: &str = "operator-refresh";
pub const EXCHANGE_REFRESH: &str = "exchange-refresh";

pub const GRAPH_TOKEN: &str = "graph-token";
pub const CLASSIC_TOKEN: &str = "classic-token";

pub const CONTOSO_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const FABRIKAM_ID: &str = "22222222-2222-2222-2222-222222222222";
pub const NORTHWIND_ID: &str = "33333333-3333-3333-3333-333333333333";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn contoso() -> TenantRecord {
    TenantRecord::new(CONTOSO_ID, "Contoso", "contoso.onmicrosoft.com")
}

pub fn fabrikam() -> TenantRecord {
    TenantRecord::new(FABRIKAM_ID, "Fabrikam", "fabrikam.onmicrosoft.com")
}

pub fn northwind() -> TenantRecord {
    TenantRecord::new(NORTHWIND_ID, "Northwind Traders", "northwind.onmicrosoft.com")
}

pub fn population() -> Vec<TenantRecord> {
    vec![contoso(), fabrikam(), northwind()]
}

/// Token endpoint body with a one hour lifetime.
pub fn token_response(access_token: &str) -> Value {
    json!({
        "token_type": "Bearer",
        "scope": "https://graph.microsoft.com/.default",
        "expires_in": 3599,
        "ext_expires_in": 3599,
        "access_token": access_token,
        "refresh_token": "rotated-refresh"
    })
}

/// Graph collection page.
pub fn odata_page(items: Vec<Value>, next_link: Option<String>) -> Value {
    let mut page = json!({ "value": items });
    if let Some(link) = next_link {
        page["@odata.nextLink"] = json!(link);
    }
    page
}

pub struct Harness {
    pub server: MockServer,
    pub dir: TempDir,
    pub audit: MemoryAuditSink,
    pub core: PartnerCore<InMemoryExclusionStore>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(|builder| builder).await
    }

    pub async fn start_with<F>(customize: F) -> Self
    where
        F: FnOnce(CoreConfigBuilder) -> CoreConfigBuilder,
    {
        init_logging();
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");

        let builder = CoreConfig::builder()
            .application_id(APP_ID)
            .application_secret(APP_SECRET)
            .tenant_id(OPERATOR_TENANT)
            .refresh_token(OPERATOR_REFRESH)
            .exchange_refresh_token(EXCHANGE_REFRESH)
            .endpoints(Endpoints::all_at(server.uri()))
            .data_dir(dir.path());
        let config = customize(builder).build().expect("valid config");

        let audit = MemoryAuditSink::new();
        let core = PartnerCore::with_audit_sink(
            config,
            InMemoryExclusionStore::new(),
            Arc::new(audit.clone()),
        )
        .expect("core");

        Self {
            server,
            dir,
            audit,
            core,
        }
    }

    /// Absolute URI on the mock server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Write a fresh tenant cache so no listing call is needed.
    pub fn seed_tenants(&self, records: &[TenantRecord]) {
        let file = self.core.config().tenant_cache_file();
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).expect("cache dir");
        }
        std::fs::write(&file, serde_json::to_vec(records).expect("json")).expect("cache write");
    }

    /// Records currently in the cache file.
    pub fn cached_tenants(&self) -> Vec<TenantRecord> {
        let bytes = std::fs::read(self.core.config().tenant_cache_file()).expect("cache read");
        serde_json::from_slice(&bytes).expect("cache json")
    }

    /// Answer every v2 token request with [`GRAPH_TOKEN`].
    pub async fn mount_graph_token(&self) {
        Mock::given(method("POST"))
            .and(path_regex(r"^/[^/]+/oauth2/v2\.0/token$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(GRAPH_TOKEN)))
            .mount(&self.server)
            .await;
    }

    /// Answer every v1 token request with [`CLASSIC_TOKEN`].
    pub async fn mount_classic_token(&self) {
        Mock::given(method("POST"))
            .and(path_regex(r"^/[^/]+/oauth2/token$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": "3599",
                "resource": "https://admin.microsoft.com",
                "access_token": CLASSIC_TOKEN
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve the contracts listing in two pages.
    pub async fn mount_contracts(&self, records: &[TenantRecord], expected_calls: u64) {
        let (first, second) = records.split_at(records.len() / 2);
        let next = self.url("/beta/contracts-page-2");

        Mock::given(method("GET"))
            .and(path("/beta/contracts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(odata_page(
                first.iter().map(|r| serde_json::to_value(r).expect("json")).collect(),
                Some(next),
            )))
            .expect(expected_calls)
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/beta/contracts-page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(odata_page(
                second.iter().map(|r| serde_json::to_value(r).expect("json")).collect(),
                None,
            )))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Requests received whose path equals `path`.
    pub async fn requests_to(&self, target: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == target)
            .collect()
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

/// Form body of a received request as a string.
pub fn body_text(request: &wiremock::Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}
