use crate::error::{GraphError, GraphResult, normalize_error};
use serde::Serialize;
use serde_json::Value;

/// A non-success answer from an upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamFailure {
    pub status: u16,
    pub uri: String,
    /// Operator-facing message, normalised where the upstream text is known.
    pub message: String,
}

impl UpstreamFailure {
    pub fn new(status: u16, uri: impl Into<String>, message: impl AsRef<str>) -> Self {
        Self {
            status,
            uri: uri.into(),
            message: normalize_error(message.as_ref()),
        }
    }

    /// Build from a response body, pulling the message out of the usual
    /// Graph (`error.message`) or classic (`Message`, `message`) shapes.
    pub(crate) fn from_body(status: u16, uri: impl Into<String>, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| {
                json.pointer("/error/message")
                    .or_else(|| json.get("Message"))
                    .or_else(|| json.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.chars().take(512).collect()
                }
            });
        Self::new(status, uri, message)
    }
}

/// Result of an authorised request.
///
/// Only transport failures and undecodable bodies are `Err`; everything an
/// upstream or the gate can legitimately answer is one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<T> {
    /// Every page was fetched.
    Completed(T),
    /// Some pages were fetched before an upstream failure.
    Partial { payload: T, failure: UpstreamFailure },
    /// The first request failed.
    Failed(UpstreamFailure),
    /// The tenant is not under management; nothing was sent.
    Denied { tenant: String },
    /// The identity provider refused a token.
    TokenUnavailable { tenant: String, status: u16 },
}

impl<T> RequestOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, RequestOutcome::Completed(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, RequestOutcome::Denied { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            RequestOutcome::Completed(payload) | RequestOutcome::Partial { payload, .. } => {
                Some(payload)
            }
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&UpstreamFailure> {
        match self {
            RequestOutcome::Partial { failure, .. } | RequestOutcome::Failed(failure) => {
                Some(failure)
            }
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> RequestOutcome<U> {
        match self {
            RequestOutcome::Completed(payload) => RequestOutcome::Completed(f(payload)),
            RequestOutcome::Partial { payload, failure } => RequestOutcome::Partial {
                payload: f(payload),
                failure,
            },
            RequestOutcome::Failed(failure) => RequestOutcome::Failed(failure),
            RequestOutcome::Denied { tenant } => RequestOutcome::Denied { tenant },
            RequestOutcome::TokenUnavailable { tenant, status } => {
                RequestOutcome::TokenUnavailable { tenant, status }
            }
        }
    }

    /// Whatever was fetched, or the empty value.
    pub fn into_payload(self) -> T
    where
        T: Default,
    {
        match self {
            RequestOutcome::Completed(payload) | RequestOutcome::Partial { payload, .. } => {
                payload
            }
            _ => T::default(),
        }
    }

    /// Fetched data on success or partial success, otherwise the matching error.
    pub fn into_result(self) -> GraphResult<T> {
        match self {
            RequestOutcome::Completed(payload) | RequestOutcome::Partial { payload, .. } => {
                Ok(payload)
            }
            RequestOutcome::Failed(failure) => {
                Err(GraphError::upstream(failure.uri, failure.status))
            }
            RequestOutcome::Denied { tenant } => Err(GraphError::denied(tenant)),
            RequestOutcome::TokenUnavailable { tenant, status } => {
                Err(GraphError::token_acquisition(tenant, "request", status))
            }
        }
    }

    /// Status to report at an HTTP boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            RequestOutcome::Completed(_) | RequestOutcome::Partial { .. } => 200,
            RequestOutcome::Failed(failure) => failure.status,
            RequestOutcome::Denied { .. } => 403,
            RequestOutcome::TokenUnavailable { .. } => 502,
        }
    }
}

/// Spread page payloads into individual items. Array pages contribute their
/// elements; any other page contributes itself.
pub fn flatten_pages(pages: Vec<Value>) -> Vec<Value> {
    let mut items = Vec::new();
    for page in pages {
        match page {
            Value::Array(elements) => items.extend(elements),
            other => items.push(other),
        }
    }
    items
}
