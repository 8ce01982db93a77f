//! Tenant directory refresh through the Graph contracts listing.

mod common;

use common::*;
use futures::future::join_all;
use partner_graph::request::{GraphRequest, RequestOutcome};
use partner_graph::tenant::ALL_TENANTS_ID;
use partner_graph::{AuthDecision, TenantQuery};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_missing_cache_is_refreshed_from_contracts() {
    let h = Harness::start().await;
    h.mount_graph_token().await;

    Mock::given(method("GET"))
        .and(path("/beta/contracts"))
        .and(query_param("$top", "999"))
        .and(query_param(
            "$select",
            "customerId,defaultDomainName,displayName",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata_page(
            vec![serde_json::to_value(contoso()).unwrap()],
            Some(h.url("/beta/contracts-page-2")),
        )))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta/contracts-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata_page(
            vec![
                serde_json::to_value(fabrikam()).unwrap(),
                serde_json::to_value(northwind()).unwrap(),
            ],
            None,
        )))
        .expect(1)
        .mount(&h.server)
        .await;

    let tenants = h.core.get_tenants(TenantQuery::default()).await.unwrap();

    assert_eq!(tenants, population());
    assert_eq!(h.cached_tenants(), population());

    // Listing runs against the operator's own tenant
    let token_requests = h
        .requests_to(&format!("/{}/oauth2/v2.0/token", OPERATOR_TENANT))
        .await;
    assert_eq!(token_requests.len(), 1);
}

#[tokio::test]
async fn test_unreadable_contract_is_skipped() {
    let h = Harness::start().await;
    h.mount_graph_token().await;

    Mock::given(method("GET"))
        .and(path("/beta/contracts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata_page(
            vec![
                serde_json::to_value(contoso()).unwrap(),
                json!({
                    "customerId": "44444444-4444-4444-4444-444444444444",
                    "displayName": null,
                    "defaultDomainName": "broken.onmicrosoft.com"
                }),
                serde_json::to_value(northwind()).unwrap(),
            ],
            None,
        )))
        .expect(1)
        .mount(&h.server)
        .await;

    let tenants = h.core.get_tenants(TenantQuery::unfiltered()).await.unwrap();
    assert_eq!(tenants, vec![contoso(), northwind()]);
    assert_eq!(h.cached_tenants(), vec![contoso(), northwind()]);

    let decision = h
        .core
        .gate()
        .is_authorized("northwind.onmicrosoft.com", &h.url("/v1.0/users"))
        .await;
    assert_eq!(decision, AuthDecision::Tenant);
}

#[tokio::test]
async fn test_fresh_cache_needs_no_upstream() {
    let h = Harness::start().await;
    h.seed_tenants(&population());

    let tenants = h.core.get_tenants(TenantQuery::default()).await.unwrap();
    assert_eq!(tenants.len(), 3);
    assert_eq!(h.request_count().await, 0);
}

#[tokio::test]
async fn test_legacy_pascal_case_cache_loads() {
    let h = Harness::start().await;
    let file = h.core.config().tenant_cache_file();
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(
        &file,
        json!([{
            "CustomerId": CONTOSO_ID,
            "DisplayName": "Contoso",
            "DefaultDomainName": "contoso.onmicrosoft.com"
        }])
        .to_string(),
    )
    .unwrap();

    let tenants = h.core.get_tenants(TenantQuery::unfiltered()).await.unwrap();
    assert_eq!(tenants, vec![contoso()]);
    assert_eq!(h.request_count().await, 0);
}

#[tokio::test]
async fn test_expired_cache_is_refreshed_every_time() {
    let h = Harness::start_with(|builder| builder.tenant_cache_ttl(Duration::ZERO)).await;
    h.seed_tenants(&[contoso()]);
    h.mount_graph_token().await;
    h.mount_contracts(&population(), 2).await;

    for _ in 0..2 {
        let tenants = h.core.get_tenants(TenantQuery::unfiltered()).await.unwrap();
        assert_eq!(tenants.len(), 3);
    }
}

#[tokio::test]
async fn test_excluded_tenant_hidden_but_still_managed() {
    let h = Harness::start().await;
    h.seed_tenants(&population());
    h.mount_graph_token().await;

    assert!(
        h.core
            .exclude("contoso.onmicrosoft.com", "alice@msp.example")
            .await
            .unwrap()
    );

    let listed: Vec<String> = h
        .core
        .get_tenants(TenantQuery::default())
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.default_domain_name)
        .collect();
    assert_eq!(
        listed,
        vec!["fabrikam.onmicrosoft.com", "northwind.onmicrosoft.com"]
    );

    let everything = h.core.get_tenants(TenantQuery::unfiltered()).await.unwrap();
    assert_eq!(everything.len(), 3);
    assert_eq!(h.cached_tenants().len(), 3);

    let decision = h
        .core
        .gate()
        .is_authorized("contoso.onmicrosoft.com", &h.url("/v1.0/users"))
        .await;
    assert_eq!(decision, AuthDecision::Tenant);

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata_page(vec![], None)))
        .expect(1)
        .mount(&h.server)
        .await;
    let outcome = h
        .core
        .executor()
        .graph_get(&GraphRequest::new("/v1.0/users", "contoso.onmicrosoft.com"))
        .await
        .unwrap();
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_all_tenants_selector_comes_first() {
    let h = Harness::start().await;
    h.seed_tenants(&population());

    let tenants = h
        .core
        .get_tenants(TenantQuery::with_all_tenants_selector())
        .await
        .unwrap();

    assert_eq!(tenants.len(), 4);
    assert_eq!(tenants[0].customer_id, ALL_TENANTS_ID);
    assert!(tenants[0].is_all_tenants());
    assert_eq!(tenants[1], contoso());
}

#[tokio::test]
async fn test_failed_listing_without_cache_denies_everything() {
    let h = Harness::start().await;
    h.mount_graph_token().await;

    Mock::given(method("GET"))
        .and(path("/beta/contracts"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": "ServiceUnavailable", "message": "Try again later"}
        })))
        .mount(&h.server)
        .await;

    assert!(h.core.get_tenants(TenantQuery::default()).await.is_err());

    let outcome = h
        .core
        .executor()
        .graph_get(&GraphRequest::new("/v1.0/users", "contoso.onmicrosoft.com"))
        .await
        .unwrap();
    assert!(matches!(outcome, RequestOutcome::Denied { .. }));
    assert!(h.requests_to("/v1.0/users").await.is_empty());
}

#[tokio::test]
async fn test_failed_refresh_serves_stale_cache() {
    let h = Harness::start_with(|builder| builder.tenant_cache_ttl(Duration::ZERO)).await;
    h.seed_tenants(&[fabrikam()]);
    h.mount_graph_token().await;

    Mock::given(method("GET"))
        .and(path("/beta/contracts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let tenants = h.core.get_tenants(TenantQuery::unfiltered()).await.unwrap();
    assert_eq!(tenants, vec![fabrikam()]);
}

#[tokio::test]
async fn test_concurrent_callers_refresh_once() {
    let h = Harness::start().await;
    h.mount_graph_token().await;
    h.mount_contracts(&population(), 1).await;

    let directory = h.core.directory();
    let results = join_all((0..6).map(|_| directory.get_tenants(TenantQuery::unfiltered()))).await;

    for result in results {
        assert_eq!(result.unwrap().len(), 3);
    }
}

#[tokio::test]
async fn test_lookups_resolve_any_identity() {
    let h = Harness::start().await;
    h.seed_tenants(&population());
    let directory = h.core.directory();

    assert_eq!(
        directory.find("NORTHWIND TRADERS").await.unwrap(),
        Some(northwind())
    );
    assert_eq!(
        directory.find(FABRIKAM_ID).await.unwrap(),
        Some(fabrikam())
    );
    assert_eq!(
        directory
            .customer_id_for_domain("Contoso.OnMicrosoft.com")
            .await
            .unwrap()
            .as_deref(),
        Some(CONTOSO_ID)
    );
    assert_eq!(directory.find("").await.unwrap(), None);
}

#[tokio::test]
async fn test_explicit_refresh_rewrites_cache() {
    let h = Harness::start().await;
    h.seed_tenants(&[contoso()]);
    h.mount_graph_token().await;
    h.mount_contracts(&population(), 1).await;

    let refreshed = h.core.directory().refresh().await.unwrap();
    assert_eq!(refreshed, population());
    assert_eq!(h.cached_tenants(), population());
}
