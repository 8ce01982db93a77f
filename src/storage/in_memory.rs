//! In-memory exclusion store.
//!
//! Useful for tests and for hosts that keep exclusions elsewhere and only need
//! a per-process view. Contents are lost when the process exits.

use crate::storage::{ExcludedTenant, ExclusionStore, StorageError};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory exclusion store.
///
/// Records are kept in insertion order; exclusion sets are small so lookups
/// scan the vector.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExclusionStore {
    records: Arc<RwLock<Vec<ExcludedTenant>>>,
}

impl InMemoryExclusionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records (duplicates are dropped).
    pub fn with_records(records: impl IntoIterator<Item = ExcludedTenant>) -> Self {
        let mut unique: Vec<ExcludedTenant> = Vec::new();
        for record in records {
            if !unique
                .iter()
                .any(|r| r.tenant_default_domain == record.tenant_default_domain)
            {
                unique.push(record);
            }
        }
        Self {
            records: Arc::new(RwLock::new(unique)),
        }
    }

    /// Number of excluded tenants.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when nothing is excluded.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl ExclusionStore for InMemoryExclusionStore {
    async fn is_excluded(&self, domain: &str) -> Result<bool, StorageError> {
        let records = self.records.read().await;
        Ok(records.iter().any(|r| r.tenant_default_domain == domain))
    }

    async fn exclude(&self, record: ExcludedTenant) -> Result<bool, StorageError> {
        record.validate()?;

        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|r| r.tenant_default_domain == record.tenant_default_domain)
        {
            return Ok(false);
        }
        records.push(record);
        Ok(true)
    }

    async fn include(&self, domain: &str) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.tenant_default_domain != domain);
        Ok(records.len() != before)
    }

    async fn list_excluded(&self) -> Result<Vec<ExcludedTenant>, StorageError> {
        Ok(self.records.read().await.clone())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.records.write().await.clear();
        Ok(())
    }
}
