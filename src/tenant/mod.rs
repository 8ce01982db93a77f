//! Tenant directory: the authoritative set of tenants under management.
//!
//! [`TenantDirectory`] answers listings and identity lookups from a JSON cache
//! file, refreshing it from a [`TenantSource`] when it is missing, unreadable
//! or older than the freshness window.

mod directory;
mod record;
mod source;

pub use directory::{TenantDirectory, TenantQuery};
pub use record::{ALL_TENANTS_DISPLAY_NAME, ALL_TENANTS_ID, TenantRecord, tenant_matches};
pub use source::{CONTRACTS_LISTING, GraphTenantSource, TenantSource};
