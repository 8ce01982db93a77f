//! Acting-user identity decoded from the hosting platform's principal header.
//!
//! The header carries a base64-encoded JSON document such as
//! `{"identityProvider":"aad","userDetails":"alice@msp.example","userRoles":["admin"]}`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Actor recorded when no usable principal header is present.
pub const SYSTEM_ACTOR: &str = "system";

/// Decoded client principal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPrincipal {
    #[serde(default)]
    pub identity_provider: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_details: Option<String>,
    #[serde(default)]
    pub user_roles: Vec<String>,
}

impl ClientPrincipal {
    /// Decode a principal header value. Returns `None` for anything that is not
    /// base64-encoded JSON.
    pub fn decode(header_value: &str) -> Option<Self> {
        let bytes = STANDARD.decode(header_value.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Username to record for an action, falling back to [`SYSTEM_ACTOR`].
    pub fn username_from_header(header_value: Option<&str>) -> String {
        header_value
            .and_then(Self::decode)
            .and_then(|p| p.user_details)
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string())
    }
}
