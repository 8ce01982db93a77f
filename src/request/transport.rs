use super::dto::{ClassicRequest, EXCHANGE_RESOURCE, ExoCommand, GraphRequest};
use super::outcome::{RequestOutcome, UpstreamFailure};
use crate::config::Endpoints;
use crate::error::{GraphError, GraphResult};
use crate::token::{GraphTokenParams, TokenProvider, TokenSet};
use log::{debug, warn};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use uuid::Uuid;

/// Cursor property of Graph collection pages.
pub const ODATA_NEXT_LINK: &str = "@odata.nextLink";

/// Cursor property of classic API pages.
pub const CLASSIC_NEXT_LINK: &str = "NextLink";

/// Mailbox that anchors Exchange admin API calls, before `@<customer id>`.
pub const EXCHANGE_ANCHOR_MAILBOX: &str = "UPN:SystemMailbox{bb558c35-97f1-4cb9-8ff7-d53741dc928c}";

/// Authenticated HTTP plumbing without any authorization check.
///
/// Acquires the token for each call, sends it, follows pagination cursors and
/// turns upstream answers into [`RequestOutcome`]s. Callers acting on behalf
/// of a tenant go through [`GraphExecutor`](super::GraphExecutor) instead.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    tokens: TokenProvider,
    endpoints: Endpoints,
}

impl Transport {
    pub fn new(http: reqwest::Client, tokens: TokenProvider, endpoints: Endpoints) -> Self {
        Self {
            http,
            tokens,
            endpoints,
        }
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Absolute URI for a Graph path or URI.
    pub fn graph_uri(&self, uri: &str) -> String {
        resolve(&self.endpoints.graph, uri)
    }

    /// Absolute URI for a classic admin path or URI.
    pub fn classic_uri(&self, uri: &str) -> String {
        resolve(&self.endpoints.classic_admin, uri)
    }

    /// Exchange command endpoint for a customer.
    pub fn exchange_invoke_uri(&self, customer_id: &str) -> String {
        format!(
            "{}/adminapi/beta/{}/InvokeCommand",
            self.endpoints.exchange, customer_id
        )
    }

    /// GET a Graph collection, following `@odata.nextLink`.
    ///
    /// Each page contributes its `value` property, or the whole body when it
    /// has none.
    pub async fn graph_get(
        &self,
        request: &GraphRequest,
    ) -> GraphResult<RequestOutcome<Vec<Value>>> {
        let token = match token_or_outcome(
            self.tokens.acquire_graph_token(graph_params(request)).await,
        )? {
            Ok(token) => token,
            Err(outcome) => return Ok(outcome),
        };
        let headers = graph_headers(&token)?;

        self.paginate(
            Pagination {
                first: self.graph_uri(&request.uri),
                base: &self.endpoints.graph,
                tenant: &request.tenant,
                operation: "graph_get",
                cursor: ODATA_NEXT_LINK,
                unwrap_value: true,
                single_page: request.single_page,
            },
            || headers.clone(),
        )
        .await
    }

    /// Send one Graph request with a JSON body.
    pub async fn graph_send(
        &self,
        request: &GraphRequest,
        method: Method,
        body: &Value,
    ) -> GraphResult<RequestOutcome<Value>> {
        let token = match token_or_outcome(
            self.tokens.acquire_graph_token(graph_params(request)).await,
        )? {
            Ok(token) => token,
            Err(outcome) => return Ok(outcome),
        };
        let headers = graph_headers(&token)?;

        self.send_once(
            method,
            self.graph_uri(&request.uri),
            headers,
            Some(body),
            &request.tenant,
            "graph_post",
        )
        .await
    }

    /// GET a classic API collection, following `NextLink`. Pages are kept whole.
    pub async fn classic_get(
        &self,
        request: &ClassicRequest,
    ) -> GraphResult<RequestOutcome<Vec<Value>>> {
        let token = match token_or_outcome(
            self.tokens
                .acquire_classic_token(&request.tenant, &request.resource)
                .await,
        )? {
            Ok(token) => token,
            Err(outcome) => return Ok(outcome),
        };
        let bearer = bearer_header(&token)?;
        let extra = custom_headers(&request.headers);

        self.paginate(
            Pagination {
                first: self.classic_uri(&request.uri),
                base: &self.endpoints.classic_admin,
                tenant: &request.tenant,
                operation: "classic_get",
                cursor: CLASSIC_NEXT_LINK,
                unwrap_value: false,
                single_page: request.single_page,
            },
            || classic_headers(&bearer, &extra),
        )
        .await
    }

    /// Send one classic API request with a JSON body.
    pub async fn classic_send(
        &self,
        request: &ClassicRequest,
        method: Method,
        body: &Value,
    ) -> GraphResult<RequestOutcome<Value>> {
        let token = match token_or_outcome(
            self.tokens
                .acquire_classic_token(&request.tenant, &request.resource)
                .await,
        )? {
            Ok(token) => token,
            Err(outcome) => return Ok(outcome),
        };
        let bearer = bearer_header(&token)?;
        let headers = classic_headers(&bearer, &custom_headers(&request.headers));

        self.send_once(
            method,
            self.classic_uri(&request.uri),
            headers,
            Some(body),
            &request.tenant,
            "classic_post",
        )
        .await
    }

    /// Invoke an Exchange Online cmdlet for `customer_id` and return the
    /// response's `value`.
    pub async fn exo_invoke(
        &self,
        tenant: &str,
        customer_id: &str,
        command: &ExoCommand,
    ) -> GraphResult<RequestOutcome<Value>> {
        let token = match token_or_outcome(
            self.tokens
                .acquire_classic_token(tenant, EXCHANGE_RESOURCE)
                .await,
        )? {
            Ok(token) => token,
            Err(outcome) => return Ok(outcome),
        };

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer_header(&token)?);
        let anchor = format!("{}@{}", EXCHANGE_ANCHOR_MAILBOX, customer_id);
        headers.insert(
            HeaderName::from_static("x-anchormailbox"),
            HeaderValue::from_str(&anchor)
                .map_err(|_| GraphError::configuration("customer id is not a valid header value"))?,
        );

        let body = serde_json::to_value(command)?;
        let outcome = self
            .send_once(
                Method::POST,
                self.exchange_invoke_uri(customer_id),
                headers,
                Some(&body),
                tenant,
                "exo_invoke",
            )
            .await?;

        match outcome {
            RequestOutcome::Completed(Value::Object(mut object)) => object
                .remove("value")
                .map(RequestOutcome::Completed)
                .ok_or_else(|| GraphError::malformed("exo_invoke", "value")),
            RequestOutcome::Completed(_) => Err(GraphError::malformed("exo_invoke", "value")),
            other => Ok(other),
        }
    }

    async fn paginate<F>(
        &self,
        pagination: Pagination<'_>,
        headers: F,
    ) -> GraphResult<RequestOutcome<Vec<Value>>>
    where
        F: Fn() -> HeaderMap,
    {
        let mut pages = Vec::new();
        let mut next = Some(pagination.first);

        while let Some(url) = next.take() {
            debug!("{} fetching {}", pagination.operation, url);
            let response = self.http.get(&url).headers(headers()).send().await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(
                    "{} failed: tenant={} status={} uri={}",
                    pagination.operation,
                    pagination.tenant,
                    status.as_u16(),
                    url
                );
                let failure = UpstreamFailure::from_body(status.as_u16(), url, &body);
                return Ok(if pages.is_empty() {
                    RequestOutcome::Failed(failure)
                } else {
                    RequestOutcome::Partial {
                        payload: pages,
                        failure,
                    }
                });
            }

            let body = read_json(response).await?;

            if !pagination.single_page {
                next = body
                    .get(pagination.cursor)
                    .and_then(Value::as_str)
                    .filter(|link| !link.is_empty())
                    .map(|link| resolve(pagination.base, link));
            }

            let page = match body {
                Value::Object(mut object) if pagination.unwrap_value => {
                    match object.remove("value") {
                        Some(value) => value,
                        None => Value::Object(object),
                    }
                }
                other => other,
            };
            pages.push(page);
        }

        Ok(RequestOutcome::Completed(pages))
    }

    async fn send_once(
        &self,
        method: Method,
        url: String,
        headers: HeaderMap,
        body: Option<&Value>,
        tenant: &str,
        operation: &str,
    ) -> GraphResult<RequestOutcome<Value>> {
        debug!("{} {} {}", operation, method, url);
        let mut builder = self.http.request(method, &url).headers(headers);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                "{} failed: tenant={} status={} uri={}",
                operation,
                tenant,
                status.as_u16(),
                url
            );
            return Ok(RequestOutcome::Failed(UpstreamFailure::from_body(
                status.as_u16(),
                url,
                &text,
            )));
        }

        Ok(RequestOutcome::Completed(read_json(response).await?))
    }
}

struct Pagination<'a> {
    first: String,
    base: &'a str,
    tenant: &'a str,
    operation: &'static str,
    cursor: &'static str,
    unwrap_value: bool,
    single_page: bool,
}

/// Turn a refused token into an outcome; keep other errors as errors.
fn token_or_outcome<T>(
    result: GraphResult<TokenSet>,
) -> GraphResult<Result<TokenSet, RequestOutcome<T>>> {
    match result {
        Ok(token) => Ok(Ok(token)),
        Err(GraphError::TokenAcquisition { tenant, status, .. }) => {
            Ok(Err(RequestOutcome::TokenUnavailable { tenant, status }))
        }
        Err(err) => Err(err),
    }
}

fn graph_params(request: &GraphRequest) -> GraphTokenParams {
    let params = GraphTokenParams::for_tenant(request.tenant.clone()).as_app(request.as_app);
    match &request.scope {
        Some(scope) => params.scope(scope.clone()),
        None => params,
    }
}

fn bearer_header(token: &TokenSet) -> GraphResult<HeaderValue> {
    let bearer = token
        .authorization()
        .ok_or_else(|| GraphError::malformed("token", "access_token"))?;
    let mut value =
        HeaderValue::from_str(&bearer).map_err(|_| GraphError::malformed("token", "access_token"))?;
    value.set_sensitive(true);
    Ok(value)
}

fn graph_headers(token: &TokenSet) -> GraphResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer_header(token)?);
    headers.insert(
        HeaderName::from_static("consistencylevel"),
        HeaderValue::from_static("eventual"),
    );
    for (name, value) in token.extra_headers() {
        if let Some((name, value)) = header_pair(name, value) {
            headers.insert(name, value);
        }
    }
    Ok(headers)
}

fn custom_headers(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        if let Some((name, value)) = header_pair(name, value) {
            headers.insert(name, value);
        }
    }
    headers
}

/// Headers for one classic request; correlation ids are fresh every call.
fn classic_headers(bearer: &HeaderValue, extra: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer.clone());
    for name in [
        "x-ms-client-request-id",
        "x-ms-client-session-id",
        "x-ms-correlation-id",
    ] {
        if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    for (name, value) in extra {
        headers.insert(name.clone(), value.clone());
    }
    headers
}

/// Valid, non-authorization header pair, or `None`.
fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    if name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
        return None;
    }
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            debug!("Skipping header '{}' that is not valid on the wire", name);
            None
        }
    }
}

async fn read_json(response: reqwest::Response) -> GraphResult<Value> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Join a path onto `base`; absolute URIs pass through.
fn resolve(base: &str, uri: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        uri.to_string()
    } else if uri.starts_with('/') {
        format!("{}{}", base, uri)
    } else {
        format!("{}/{}", base, uri)
    }
}
