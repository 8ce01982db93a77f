//! Error types for the partner request layer.
//!
//! Ordinary upstream failures (a refused token, a denied tenant, a non-2xx page)
//! are not errors here: they are reported through
//! [`RequestOutcome`](crate::request::RequestOutcome). `GraphError` covers the
//! conditions callers cannot paper over, such as transport failures and
//! response bodies that are not the JSON the protocol promises.

use crate::storage::StorageError;

/// Main error type for partner-graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The identity provider refused to issue a token
    #[error("Token acquisition failed for tenant '{tenant}' in {operation}: HTTP {status}")]
    TokenAcquisition {
        tenant: String,
        operation: String,
        status: u16,
    },

    /// The tenant is not under the operator's management
    #[error("Access denied to tenant '{tenant}'")]
    AuthorizationDenied { tenant: String },

    /// Graph or classic endpoint answered with a non-success status
    #[error("Upstream request to {uri} failed with HTTP {status}")]
    UpstreamRequest { uri: String, status: u16 },

    /// A response was valid JSON but lacked an expected property
    #[error("Malformed response from {operation}: missing '{property}'")]
    MalformedResponse { operation: String, property: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Tenant cache file could not be read or written
    #[error("Cache I/O error on {path}: {source}")]
    CacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Exclusion store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GraphError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a token acquisition error
    pub fn token_acquisition(
        tenant: impl Into<String>,
        operation: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::TokenAcquisition {
            tenant: tenant.into(),
            operation: operation.into(),
            status,
        }
    }

    /// Create an authorization denied error
    pub fn denied(tenant: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            tenant: tenant.into(),
        }
    }

    /// Create an upstream request error
    pub fn upstream(uri: impl Into<String>, status: u16) -> Self {
        Self::UpstreamRequest {
            uri: uri.into(),
            status,
        }
    }

    /// Create a malformed response error
    pub fn malformed(operation: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation: operation.into(),
            property: property.into(),
        }
    }

    /// Wrap an I/O error raised while touching the tenant cache
    pub fn cache_io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// HTTP status code to use when this error reaches a transport boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            GraphError::Configuration { .. } => 500,
            GraphError::TokenAcquisition { .. } => 502,
            GraphError::AuthorizationDenied { .. } => 403,
            GraphError::UpstreamRequest { status, .. } => *status,
            GraphError::MalformedResponse { .. } | GraphError::Json(_) => 502,
            GraphError::Http(e) if e.is_timeout() => 504,
            GraphError::Http(_) => 502,
            GraphError::CacheIo { .. } | GraphError::Storage(_) => 500,
        }
    }
}

/// Result type alias for partner-graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Map known upstream error messages to something an operator can act on.
///
/// Messages that are not recognised are returned unchanged.
pub fn normalize_error(message: &str) -> String {
    const KNOWN: &[(&str, &str)] = &[
        (
            "Request not applicable to target tenant.",
            "Required license not available for this tenant",
        ),
        (
            "Neither tenant is B2C or tenant doesn't have premium license",
            "This feature requires a P1 license or higher",
        ),
        (
            "Response status code does not indicate success: 400 (Bad Request).",
            "Error 400 occured. There is an issue with the token configuration for this tenant. Please perform an access check",
        ),
        (
            "Microsoft.Skype.Sync.Pstn.Tnm.Common.Http.HttpResponseException",
            "Could not connect to Teams Admin center - Tenant might be missing a Teams license",
        ),
        (
            "Provide valid credential.",
            "Error 400: There is an issue with your Exchange Token configuration. Please perform an access check for this tenant",
        ),
    ];

    KNOWN
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, friendly)| friendly.to_string())
        .unwrap_or_else(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = GraphError::token_acquisition("contoso.com", "acquire_graph_token", 400);
        assert!(error.to_string().contains("contoso.com"));
        assert!(error.to_string().contains("400"));
        assert_eq!(error.status_code(), 502);
    }

    #[test]
    fn test_denied_maps_to_forbidden() {
        let error = GraphError::denied("fabrikam.com");
        assert_eq!(error.status_code(), 403);
        assert!(error.to_string().contains("fabrikam.com"));
    }

    #[test]
    fn test_upstream_status_passes_through() {
        assert_eq!(GraphError::upstream("https://x", 429).status_code(), 429);
    }

    #[test]
    fn test_normalize_known_message() {
        let friendly = normalize_error("Error: Request not applicable to target tenant. (code 7)");
        assert_eq!(friendly, "Required license not available for this tenant");
    }

    #[test]
    fn test_normalize_unknown_message_is_unchanged() {
        assert_eq!(normalize_error("something else"), "something else");
    }

    #[test]
    fn test_error_chain() {
        let storage = StorageError::busy("store exclusion");
        let error = GraphError::from(storage);
        assert!(error.to_string().contains("Storage error"));
        assert!(error.to_string().contains("store exclusion"));
        assert_eq!(error.status_code(), 500);
    }
}
