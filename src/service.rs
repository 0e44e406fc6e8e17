//! Lookup Service Module
//!
//! Orchestrates one request: access gate, cache pruning, cache read, upstream
//! resolution and cache write. Every failure other than a rejected caller
//! degrades to an absent location.
use crate::cache;
use crate::canonical::{canonicalize, first_address, CanonicalKey};
use crate::error::{GeoError, Result};
use crate::gate::AccessGate;
use crate::geo::Resolver;
use crate::models::{CacheLookup, Location};
use crate::store::DayStore;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, warn};

/// How long entries live and whether failed lookups are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub retention_days: i64,
    /// When set, a failed resolution is stored as `null` and served from the
    /// cache until it ages out. Otherwise it is retried on every request.
    pub cache_failures: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            retention_days: cache::DEFAULT_RETENTION_DAYS,
            cache_failures: true,
        }
    }
}

pub struct GeoService {
    store: Arc<dyn DayStore>,
    resolver: Arc<dyn Resolver>,
    gate: AccessGate,
    policy: CachePolicy,
}

impl GeoService {
    pub fn new(
        store: Arc<dyn DayStore>,
        resolver: Arc<dyn Resolver>,
        gate: AccessGate,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            resolver,
            gate,
            policy,
        }
    }

    /// Locates `address` using the local calendar date for cache partitioning.
    pub async fn locate(&self, address: &str, user_agent: &str) -> Result<Option<Location>> {
        self.locate_on(address, user_agent, Local::now().date_naive()).await
    }

    /// Locates `address` as of `today`. `address` may be a forwarding chain;
    /// only its first element is used. The only error returned is
    /// [`GeoError::AccessDenied`].
    pub async fn locate_on(
        &self,
        address: &str,
        user_agent: &str,
        today: NaiveDate,
    ) -> Result<Option<Location>> {
        if !self.gate.allows(user_agent) {
            debug!("Rejected user agent: {:?}", user_agent);
            return Err(GeoError::AccessDenied);
        }

        let retention_days = self.policy.retention_days;
        if let Err(e) = self
            .with_store(move |store| cache::prune(store, today, retention_days))
            .await
        {
            warn!("Cache pruning failed: {}", e);
        }

        let address = first_address(address).to_string();
        let key = match canonicalize(&address) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!("Address is uncacheable: {}", e);
                None
            }
        };

        if let Some(key) = &key {
            match self.read(key.clone()).await {
                Ok(CacheLookup::Hit(Some(location))) => return Ok(Some(location)),
                Ok(CacheLookup::Hit(None)) if self.policy.cache_failures => return Ok(None),
                Ok(_) => {}
                Err(e) => warn!("Cache read for {} failed: {}", key, e),
            }
        }

        let location = self.resolver.resolve(&address).await;

        if let Some(key) = key {
            if location.is_some() || self.policy.cache_failures {
                if let Err(e) = self
                    .with_store(move |store| cache::write(store, today, &key, location.as_ref()))
                    .await
                {
                    warn!("Cache write failed: {}", e);
                }
            }
        }

        Ok(location)
    }

    async fn read(&self, key: CanonicalKey) -> Result<CacheLookup> {
        let skip_null = !self.policy.cache_failures;
        self.with_store(move |store| cache::read(store, &key, skip_null)).await
    }

    /// Runs blocking store work off the async executor.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn DayStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| GeoError::Store(format!("store task failed: {}", e)))?
    }
}
