use super::record::{TenantRecord, eq_ignore_case};
use super::source::TenantSource;
use crate::config::CoreConfig;
use crate::error::{GraphError, GraphResult};
use crate::storage::ExclusionStore;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

/// Listing options for [`TenantDirectory::get_tenants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantQuery {
    /// Drop tenants present in the exclusion store.
    pub exclude_hidden: bool,
    /// Put the "all tenants" pseudo record first.
    pub include_all_tenants: bool,
}

impl Default for TenantQuery {
    fn default() -> Self {
        Self {
            exclude_hidden: true,
            include_all_tenants: false,
        }
    }
}

impl TenantQuery {
    /// Every tenant, exclusions ignored, no pseudo record.
    pub fn unfiltered() -> Self {
        Self {
            exclude_hidden: false,
            include_all_tenants: false,
        }
    }

    /// Filtered listing for tenant pickers.
    pub fn with_all_tenants_selector() -> Self {
        Self {
            exclude_hidden: true,
            include_all_tenants: true,
        }
    }
}

/// Authoritative set of managed tenants behind a TTL file cache.
///
/// The cache file always holds the full, unfiltered population. Reads serve
/// it directly while it is younger than the freshness window; otherwise one
/// caller refreshes from the [`TenantSource`] while the others wait and then
/// read the fresh file.
#[derive(Debug)]
pub struct TenantDirectory<S, E> {
    source: S,
    exclusions: E,
    cache_file: PathBuf,
    ttl: Duration,
    refresh_lock: Mutex<()>,
}

impl<S: TenantSource, E: ExclusionStore> TenantDirectory<S, E> {
    pub fn new(source: S, exclusions: E, cache_file: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            source,
            exclusions,
            cache_file: cache_file.into(),
            ttl,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Directory using the cache location and freshness window from `config`.
    pub fn from_config(source: S, exclusions: E, config: &CoreConfig) -> Self {
        Self::new(
            source,
            exclusions,
            config.tenant_cache_file(),
            config.tenant_cache_ttl(),
        )
    }

    pub fn exclusions(&self) -> &E {
        &self.exclusions
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Tenant listing in upstream order, optionally filtered and prefixed.
    pub async fn get_tenants(&self, query: TenantQuery) -> GraphResult<Vec<TenantRecord>> {
        let records = self.load().await?;

        let hidden: HashSet<String> = if query.exclude_hidden {
            self.exclusions
                .list_excluded()
                .await?
                .into_iter()
                .map(|r| r.tenant_default_domain)
                .collect()
        } else {
            HashSet::new()
        };

        let mut listing = Vec::with_capacity(records.len() + 1);
        if query.include_all_tenants {
            listing.push(TenantRecord::all_tenants());
        }
        listing.extend(
            records
                .into_iter()
                .filter(|r| !hidden.contains(&r.default_domain_name)),
        );
        Ok(listing)
    }

    /// The full unfiltered population.
    pub async fn all_tenants(&self) -> GraphResult<Vec<TenantRecord>> {
        self.load().await
    }

    /// First record answering to `identity` (domain, customer id or display name).
    pub async fn find(&self, identity: &str) -> GraphResult<Option<TenantRecord>> {
        if identity.is_empty() {
            return Ok(None);
        }
        Ok(self.load().await?.into_iter().find(|r| r.matches(identity)))
    }

    /// Customer id of the tenant whose default domain is `domain`.
    pub async fn customer_id_for_domain(&self, domain: &str) -> GraphResult<Option<String>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|r| eq_ignore_case(&r.default_domain_name, domain))
            .map(|r| r.customer_id))
    }

    /// Refresh from upstream now, regardless of cache age.
    pub async fn refresh(&self) -> GraphResult<Vec<TenantRecord>> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn load(&self) -> GraphResult<Vec<TenantRecord>> {
        if let Some(records) = self.read_fresh().await? {
            return Ok(records);
        }

        let _guard = self.refresh_lock.lock().await;

        // A concurrent caller may have refreshed while we waited
        if let Some(records) = self.read_fresh().await? {
            return Ok(records);
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> GraphResult<Vec<TenantRecord>> {
        debug!("Refreshing tenant directory into {}", self.cache_file.display());

        match self.source.fetch_tenants().await {
            Ok(records) => {
                self.write_cache(&records).await?;
                info!("Tenant directory refreshed: {} tenants", records.len());
                Ok(records)
            }
            Err(err) => match self.read_cache().await {
                Ok(Some(stale)) => {
                    warn!("Tenant refresh failed, serving stale cache: {}", err);
                    Ok(stale)
                }
                _ => Err(err),
            },
        }
    }

    /// Cached records if the file exists, parses and is younger than the TTL.
    async fn read_fresh(&self) -> GraphResult<Option<Vec<TenantRecord>>> {
        let metadata = match tokio::fs::metadata(&self.cache_file).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GraphError::cache_io(&self.cache_file, e)),
        };

        let modified = metadata
            .modified()
            .map_err(|e| GraphError::cache_io(&self.cache_file, e))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age >= self.ttl {
            return Ok(None);
        }

        self.read_cache().await
    }

    /// Cached records regardless of age. A corrupt file counts as absent.
    async fn read_cache(&self) -> GraphResult<Option<Vec<TenantRecord>>> {
        let bytes = match tokio::fs::read(&self.cache_file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GraphError::cache_io(&self.cache_file, e)),
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => Ok(Some(records)),
            Err(e) => {
                warn!(
                    "Ignoring unreadable tenant cache {}: {}",
                    self.cache_file.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Write via a temporary file and rename so readers never see a torn file.
    async fn write_cache(&self, records: &[TenantRecord]) -> GraphResult<()> {
        if let Some(parent) = self.cache_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| GraphError::cache_io(parent, e))?;
            }
        }

        let mut tmp = self.cache_file.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let body = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| GraphError::cache_io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.cache_file)
            .await
            .map_err(|e| GraphError::cache_io(&self.cache_file, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ExcludedTenant, InMemoryExclusionStore};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        records: Vec<TenantRecord>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(records: Vec<TenantRecord>) -> Self {
            Self {
                records,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TenantSource for CountingSource {
        async fn fetch_tenants(&self) -> GraphResult<Vec<TenantRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                Err(GraphError::upstream("https://graph.test/beta/contracts", 503))
            } else {
                Ok(self.records.clone())
            }
        }
    }

    fn population() -> Vec<TenantRecord> {
        vec![
            TenantRecord::new("c-1", "Contoso", "contoso.onmicrosoft.com"),
            TenantRecord::new("c-2", "Fabrikam", "fabrikam.onmicrosoft.com"),
            TenantRecord::new("c-3", "Northwind", "northwind.onmicrosoft.com"),
        ]
    }

    fn directory(
        dir: &tempfile::TempDir,
        source: CountingSource,
        ttl: Duration,
    ) -> TenantDirectory<CountingSource, InMemoryExclusionStore> {
        TenantDirectory::new(
            source,
            InMemoryExclusionStore::new(),
            dir.path().join("cache").join("tenants.cache.json"),
            ttl,
        )
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_source() {
        let dir = tempfile::tempdir().unwrap();
        let directory = directory(
            &dir,
            CountingSource::new(population()),
            Duration::from_secs(420),
        );

        let first = directory.get_tenants(TenantQuery::default()).await.unwrap();
        let second = directory.get_tenants(TenantQuery::default()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(directory.source.calls(), 1);
        assert!(directory.cache_file().exists());
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let directory = directory(&dir, CountingSource::new(population()), Duration::ZERO);

        directory.all_tenants().await.unwrap();
        directory.all_tenants().await.unwrap();
        assert_eq!(directory.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_filtering_and_pseudo_record() {
        let dir = tempfile::tempdir().unwrap();
        let directory = directory(
            &dir,
            CountingSource::new(population()),
            Duration::from_secs(420),
        );
        directory
            .exclusions()
            .exclude(ExcludedTenant::new("fabrikam.onmicrosoft.com", "alice"))
            .await
            .unwrap();

        let listing = directory
            .get_tenants(TenantQuery::with_all_tenants_selector())
            .await
            .unwrap();
        let domains: Vec<&str> = listing
            .iter()
            .map(|r| r.default_domain_name.as_str())
            .collect();
        assert_eq!(
            domains,
            vec!["AllTenants", "contoso.onmicrosoft.com", "northwind.onmicrosoft.com"]
        );

        // Cache keeps the excluded tenant
        let cached: Vec<TenantRecord> =
            serde_json::from_slice(&std::fs::read(directory.cache_file()).unwrap()).unwrap();
        assert_eq!(cached.len(), 3);

        let unfiltered = directory.get_tenants(TenantQuery::unfiltered()).await.unwrap();
        assert_eq!(unfiltered, population());
    }

    #[tokio::test]
    async fn test_concurrent_loads_refresh_once() {
        let dir = tempfile::tempdir().unwrap();
        let directory = Arc::new(directory(
            &dir,
            CountingSource::new(population()),
            Duration::from_secs(420),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let directory = Arc::clone(&directory);
                tokio::spawn(async move { directory.all_tenants().await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().len(), 3);
        }

        assert_eq!(directory.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache_file = dir.path().join("tenants.cache.json");
        std::fs::write(&cache_file, serde_json::to_vec(&population()).unwrap()).unwrap();

        let directory = TenantDirectory::new(
            CountingSource::failing(),
            InMemoryExclusionStore::new(),
            &cache_file,
            Duration::ZERO,
        );

        let records = directory.all_tenants().await.unwrap();
        assert_eq!(records, population());
        assert_eq!(directory.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_without_cache_errors() {
        let dir = tempfile::tempdir().unwrap();
        let directory = directory(&dir, CountingSource::failing(), Duration::from_secs(420));

        let err = directory.all_tenants().await.unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert!(!directory.cache_file().exists());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let cache_file = dir.path().join("tenants.cache.json");
        std::fs::write(&cache_file, b"{not json").unwrap();

        let directory = TenantDirectory::new(
            CountingSource::new(population()),
            InMemoryExclusionStore::new(),
            &cache_file,
            Duration::from_secs(420),
        );

        assert_eq!(directory.all_tenants().await.unwrap().len(), 3);
        assert_eq!(directory.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let directory = directory(
            &dir,
            CountingSource::new(population()),
            Duration::from_secs(420),
        );

        assert_eq!(
            directory
                .customer_id_for_domain("Fabrikam.onmicrosoft.com")
                .await
                .unwrap(),
            Some("c-2".to_string())
        );
        assert_eq!(directory.customer_id_for_domain("nope.com").await.unwrap(), None);
        assert_eq!(
            directory.find("northwind").await.unwrap().map(|r| r.customer_id),
            Some("c-3".to_string())
        );
        assert_eq!(directory.find("").await.unwrap(), None);
    }
}
