//! Exclusion store: tenants hidden from listings.
//!
//! An exclusion is a hide-from-listing marker keyed by a tenant's default
//! domain. It never removes the tenant from the authoritative directory and it
//! never revokes the operator's right to address the tenant directly; the
//! [`TenantDirectory`](crate::tenant::TenantDirectory) consults the store only
//! when building filtered listings.
//!
//! # Key semantics
//!
//! Keys are compared exactly (case-sensitive). Normalising case is the
//! caller's job; the directory passes `defaultDomainName` values through
//! untouched.
//!
//! # Example Usage
//!
//! ```rust
//! use partner_graph::storage::{ExcludedTenant, ExclusionStore, InMemoryExclusionStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryExclusionStore::new();
//!
//! let inserted = store.exclude(ExcludedTenant::new("contoso.com", "alice@msp.example")).await?;
//! assert!(inserted);
//!
//! // Excluding again is a no-op
//! let inserted = store.exclude(ExcludedTenant::new("contoso.com", "bob@msp.example")).await?;
//! assert!(!inserted);
//!
//! assert!(store.is_excluded("contoso.com").await?);
//! assert!(!store.is_excluded("Contoso.com").await?);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use errors::StorageError;
pub use in_memory::InMemoryExclusionStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExclusionStore;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Date format used for `dateString` (day-month-year).
pub const EXCLUSION_DATE_FORMAT: &str = "%d-%m-%Y";

/// A tenant hidden from normal listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedTenant {
    /// Default domain of the excluded tenant; the unique key.
    pub tenant_default_domain: String,
    /// Operator who excluded the tenant.
    pub username: String,
    /// Local date of the exclusion, `dd-mm-yyyy`.
    pub date_string: String,
}

impl ExcludedTenant {
    /// Create an exclusion record stamped with today's local date.
    pub fn new(tenant_default_domain: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            tenant_default_domain: tenant_default_domain.into(),
            username: username.into(),
            date_string: chrono::Local::now()
                .format(EXCLUSION_DATE_FORMAT)
                .to_string(),
        }
    }

    /// Override the recorded date (used when importing existing records).
    pub fn with_date_string(mut self, date_string: impl Into<String>) -> Self {
        self.date_string = date_string.into();
        self
    }

    fn validate(&self) -> Result<(), StorageError> {
        if self.tenant_default_domain.trim().is_empty() {
            return Err(StorageError::invalid_record(
                "tenant_default_domain",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Keyed set of excluded tenants.
///
/// # Behavior
/// - `exclude` is idempotent: an existing key is left untouched, including its
///   original username and date
/// - `list_excluded` returns records in insertion order
/// - All lookups are exact, case-sensitive key matches
pub trait ExclusionStore: Send + Sync {
    /// Check whether `domain` is excluded.
    fn is_excluded(&self, domain: &str)
    -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Exclude a tenant.
    ///
    /// # Returns
    /// `true` if the record was inserted, `false` if the domain was already excluded.
    fn exclude(
        &self,
        record: ExcludedTenant,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Remove an exclusion.
    ///
    /// # Returns
    /// `true` if an exclusion existed and was removed.
    fn include(&self, domain: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// All exclusions in insertion order.
    fn list_excluded(
        &self,
    ) -> impl Future<Output = Result<Vec<ExcludedTenant>, StorageError>> + Send;

    /// Remove every exclusion.
    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<T: ExclusionStore> ExclusionStore for Arc<T> {
    fn is_excluded(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send {
        (**self).is_excluded(domain)
    }

    fn exclude(
        &self,
        record: ExcludedTenant,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send {
        (**self).exclude(record)
    }

    fn include(&self, domain: &str) -> impl Future<Output = Result<bool, StorageError>> + Send {
        (**self).include(domain)
    }

    fn list_excluded(
        &self,
    ) -> impl Future<Output = Result<Vec<ExcludedTenant>, StorageError>> + Send {
        (**self).list_excluded()
    }

    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).clear()
    }
}
