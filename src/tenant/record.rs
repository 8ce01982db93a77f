use serde::{Deserialize, Serialize};

/// Identifier shared by every field of the "all tenants" pseudo record.
pub const ALL_TENANTS_ID: &str = "AllTenants";

/// Display name of the "all tenants" pseudo record.
pub const ALL_TENANTS_DISPLAY_NAME: &str = "*All Tenants";

/// A tenant under the operator's management.
///
/// Serialized camelCase, matching the directory listing. PascalCase keys are
/// accepted on read so older cache files still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    #[serde(alias = "CustomerId")]
    pub customer_id: String,
    #[serde(alias = "DisplayName")]
    pub display_name: String,
    #[serde(alias = "DefaultDomainName")]
    pub default_domain_name: String,
}

impl TenantRecord {
    pub fn new(
        customer_id: impl Into<String>,
        display_name: impl Into<String>,
        default_domain_name: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            display_name: display_name.into(),
            default_domain_name: default_domain_name.into(),
        }
    }

    /// The synthetic "all tenants" selector.
    pub fn all_tenants() -> Self {
        Self::new(ALL_TENANTS_ID, ALL_TENANTS_DISPLAY_NAME, ALL_TENANTS_ID)
    }

    pub fn is_all_tenants(&self) -> bool {
        self.customer_id == ALL_TENANTS_ID && self.default_domain_name == ALL_TENANTS_ID
    }

    /// Case-insensitive match against domain, customer id or display name.
    pub fn matches(&self, identity: &str) -> bool {
        eq_ignore_case(&self.default_domain_name, identity)
            || eq_ignore_case(&self.customer_id, identity)
            || eq_ignore_case(&self.display_name, identity)
    }
}

/// Unicode-aware comparison; display names are not limited to ASCII.
pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        a.eq_ignore_ascii_case(b)
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

/// Whether any record answers to `identity`. Empty identities never match.
pub fn tenant_matches(records: &[TenantRecord], identity: &str) -> bool {
    !identity.is_empty() && records.iter().any(|r| r.matches(identity))
}
