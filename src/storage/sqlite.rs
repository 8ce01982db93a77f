//! SQLite-backed exclusion store.
//!
//! Exclusions must survive restarts, so the default deployment keeps them in a
//! small SQLite database next to the tenant cache.
//!
//! # Database Schema
//!
//! - `tenant_default_domain`: Text primary key
//! - `username`: Text, operator who excluded the tenant
//! - `date_string`: Text, `dd-mm-yyyy`
//! - `seq`: Integer autoincrement, preserves insertion order
//!
//! # Usage
//!
//! ```rust,no_run
//! use partner_graph::storage::{ExcludedTenant, ExclusionStore, SqliteExclusionStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteExclusionStore::new_with_path("data/excluded_tenants.db").await?;
//! store.exclude(ExcludedTenant::new("contoso.com", "alice@msp.example")).await?;
//! assert!(store.is_excluded("contoso.com").await?);
//! # Ok(())
//! # }
//! ```

use crate::storage::{ExcludedTenant, ExclusionStore, StorageError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// SQLite-based exclusion store.
#[derive(Debug, Clone)]
pub struct SqliteExclusionStore {
    pool: SqlitePool,
}

impl SqliteExclusionStore {
    /// Open (or create) the store at `database_path`.
    ///
    /// # Behavior
    /// - Creates the database file if it doesn't exist
    /// - Creates parent directories if they don't exist
    pub async fn new_with_path(database_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let database_path = database_path.as_ref();

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::open(parent.display().to_string(), e))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| StorageError::open(database_path.display().to_string(), e))?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// The pool is pinned to a single connection; every SQLite in-memory
    /// connection is its own database.
    pub async fn new_in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StorageError::open("sqlite::memory:", e))?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS excluded_tenants (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_default_domain TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL,
                date_string TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("create schema", e))?;

        Ok(())
    }
}

/// SQLITE_BUSY and SQLITE_LOCKED clear once the other writer finishes.
fn query_error(operation: &'static str, error: sqlx::Error) -> StorageError {
    match &error {
        sqlx::Error::PoolTimedOut => StorageError::busy(operation),
        sqlx::Error::Database(db) if matches!(db.code().as_deref(), Some("5") | Some("6")) => {
            StorageError::busy(operation)
        }
        _ => StorageError::backend(operation, error),
    }
}

impl ExclusionStore for SqliteExclusionStore {
    async fn is_excluded(&self, domain: &str) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM excluded_tenants WHERE tenant_default_domain = ?",
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_error("look up exclusion", e))?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn exclude(&self, record: ExcludedTenant) -> Result<bool, StorageError> {
        record.validate()?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO excluded_tenants (tenant_default_domain, username, date_string) VALUES (?, ?, ?)",
        )
        .bind(&record.tenant_default_domain)
        .bind(&record.username)
        .bind(&record.date_string)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("store exclusion", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn include(&self, domain: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM excluded_tenants WHERE tenant_default_domain = ?")
            .bind(domain)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("remove exclusion", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_excluded(&self) -> Result<Vec<ExcludedTenant>, StorageError> {
        let rows = sqlx::query(
            "SELECT tenant_default_domain, username, date_string FROM excluded_tenants ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("list exclusions", e))?;

        Ok(rows
            .into_iter()
            .map(|row| ExcludedTenant {
                tenant_default_domain: row.get("tenant_default_domain"),
                username: row.get("username"),
                date_string: row.get("date_string"),
            })
            .collect())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM excluded_tenants")
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("clear exclusions", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::test_exclusion_store;

    #[tokio::test]
    async fn test_sqlite_store_suite() {
        let store = SqliteExclusionStore::new_in_memory().await.unwrap();
        test_exclusion_store(store).await;
    }

    #[tokio::test]
    async fn test_exclusions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("excluded.db");

        {
            let store = SqliteExclusionStore::new_with_path(&path).await.unwrap();
            store
                .exclude(ExcludedTenant::new("contoso.com", "alice").with_date_string("01-02-2024"))
                .await
                .unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteExclusionStore::new_with_path(&path).await.unwrap();
        let listed = reopened.list_excluded().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].tenant_default_domain, "contoso.com");
        assert_eq!(listed[0].date_string, "01-02-2024");
    }
}
