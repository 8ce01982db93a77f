//! Header-like token maps returned by the provider.

use crate::error::{GraphError, GraphResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Key of the access token in a projected token set.
pub const AUTHORIZATION: &str = "Authorization";

/// Mapping from header-like keys to values.
///
/// The default projection holds only `Authorization` (the raw access token).
/// A full projection holds every top-level field of the token response.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TokenSet {
    fields: BTreeMap<String, String>,
}

impl TokenSet {
    /// Parse a token endpoint response into its full field map.
    pub(crate) fn from_response(body: Value, operation: &str) -> GraphResult<Self> {
        let object: Map<String, Value> = match body {
            Value::Object(object) => object,
            _ => return Err(GraphError::malformed(operation, "access_token")),
        };

        let fields: BTreeMap<String, String> = object
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Null => None,
                other => Some((key, other.to_string())),
            })
            .collect();

        if !fields.contains_key("access_token") {
            return Err(GraphError::malformed(operation, "access_token"));
        }

        Ok(Self { fields })
    }

    /// Reduce a full response to `{"Authorization": access_token}`.
    pub(crate) fn authorization_only(&self) -> Self {
        let mut fields = BTreeMap::new();
        if let Some(token) = self.access_token() {
            fields.insert(AUTHORIZATION.to_string(), token.to_string());
        }
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// The raw access token, whichever projection this is.
    pub fn access_token(&self) -> Option<&str> {
        self.get(AUTHORIZATION).or_else(|| self.get("access_token"))
    }

    /// `Bearer <token>` header value.
    pub fn authorization(&self) -> Option<String> {
        self.access_token().map(|t| format!("Bearer {}", t))
    }

    /// Lifetime reported by the token endpoint, if any.
    pub fn expires_in(&self) -> Option<Duration> {
        self.get("expires_in")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Entries to forward as extra request headers (everything but `Authorization`).
    pub fn extra_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter(|(k, _)| k.as_str() != AUTHORIZATION)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("keys", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}
