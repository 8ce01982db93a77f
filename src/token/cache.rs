//! Expiry-aware token reuse with per-key singleflight.

use super::request::TokenKey;
use super::set::TokenSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone)]
struct CachedToken {
    token: TokenSet,
    expires_at: Instant,
}

impl CachedToken {
    /// Expired, or within `grace` of expiring.
    fn is_expired(&self, grace: Duration) -> bool {
        Instant::now() + grace >= self.expires_at
    }
}

#[derive(Debug)]
pub(crate) struct TokenCache {
    grace: Duration,
    entries: RwLock<HashMap<TokenKey, CachedToken>>,
    flights: StdMutex<HashMap<TokenKey, Arc<Mutex<()>>>>,
}

impl TokenCache {
    pub(crate) fn new(grace: Duration) -> Self {
        Self {
            grace,
            entries: RwLock::new(HashMap::new()),
            flights: StdMutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn get(&self, key: &TokenKey) -> Option<TokenSet> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|cached| !cached.is_expired(self.grace))
            .map(|cached| cached.token.clone())
    }

    /// Store a full token set. Tokens without a usable lifetime are not kept.
    ///
    /// Entries that can no longer be served are dropped on every insert.
    pub(crate) async fn insert(&self, key: TokenKey, token: TokenSet) {
        let Some(lifetime) = token.expires_in() else {
            return;
        };
        let cached = CachedToken {
            token,
            expires_at: Instant::now() + lifetime,
        };

        let mut entries = self.entries.write().await;
        entries.retain(|_, existing| !existing.is_expired(self.grace));
        if !cached.is_expired(self.grace) {
            entries.insert(key, cached);
        }
    }

    /// Lock serializing refreshes of one key. Hand it back with
    /// [`release`](Self::release) once the refresh is done.
    pub(crate) fn flight(&self, key: &TokenKey) -> Arc<Mutex<()>> {
        self.flights()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the lock for `key` unless another caller still holds it.
    pub(crate) fn release(&self, key: &TokenKey, flight: Arc<Mutex<()>>) {
        let mut flights = self.flights();
        // One reference in the map, one in `flight`
        let idle = flights.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, &flight) && Arc::strong_count(&flight) == 2
        });
        if idle {
            flights.remove(key);
        }
    }

    fn flights(&self) -> MutexGuard<'_, HashMap<TokenKey, Arc<Mutex<()>>>> {
        match self.flights.lock() {
            Ok(flights) => flights,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) async fn clear(&self) {
        self.entries.write().await.clear();
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    pub(crate) fn flight_count(&self) -> usize {
        self.flights().len()
    }
}
