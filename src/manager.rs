//! Wiring of the cache and metrics databases behind one enable toggle.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::cache::ResponseCache;
use crate::config::RedisSettings;
use crate::ledger::{LegacyClientLabels, MetricsLedger};
use crate::store::{KeyValueStore, RedisStore, StoreError};

#[derive(Clone)]
struct Stores {
    cache: Arc<dyn KeyValueStore>,
    metrics: Arc<dyn KeyValueStore>,
}

/// Entry point for callers: hands out the response cache, the metrics ledger
/// and the legacy client-label interface, all bound to the same toggle.
///
/// The cache and the metrics use separate logical databases and never share
/// key space.
#[derive(Clone)]
pub struct StoreManager {
    stores: Option<Stores>,
    cache: ResponseCache,
    ledger: MetricsLedger,
    legacy: LegacyClientLabels,
}

impl StoreManager {
    pub fn new(cache: Arc<dyn KeyValueStore>, metrics: Arc<dyn KeyValueStore>) -> Self {
        Self {
            cache: ResponseCache::new(cache.clone()),
            ledger: MetricsLedger::new(metrics.clone()),
            legacy: LegacyClientLabels::new(metrics.clone()),
            stores: Some(Stores { cache, metrics }),
        }
    }

    /// A manager whose components all degrade to no-ops.
    pub fn disabled() -> Self {
        Self {
            stores: None,
            cache: ResponseCache::disabled(),
            ledger: MetricsLedger::disabled(),
            legacy: LegacyClientLabels::disabled(),
        }
    }

    /// Connects both databases, or returns a disabled manager when Redis is
    /// not configured.
    #[instrument(skip_all)]
    pub async fn connect(settings: Option<&RedisSettings>) -> Result<Self, StoreError> {
        let Some(settings) = settings else {
            info!("redis not configured; response cache and metrics disabled");
            return Ok(Self::disabled());
        };

        let (cache, metrics) = tokio::try_join!(
            RedisStore::connect(&settings.url, settings.cache_db),
            RedisStore::connect(&settings.url, settings.metrics_db),
        )?;
        info!(
            cache_db = cache.database(),
            metrics_db = metrics.database(),
            "redis stores connected"
        );
        Ok(Self::new(Arc::new(cache), Arc::new(metrics)))
    }

    pub fn is_enabled(&self) -> bool {
        self.stores.is_some()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn ledger(&self) -> &MetricsLedger {
        &self.ledger
    }

    /// Legacy per-client label bookkeeping; see [`LegacyClientLabels`].
    pub fn legacy(&self) -> &LegacyClientLabels {
        &self.legacy
    }

    /// Pings both databases.
    ///
    /// Unlike every other operation this fails when disabled, with
    /// [`StoreError::NotEnabled`].
    #[instrument(skip(self))]
    pub async fn check_health(&self) -> Result<(), StoreError> {
        let Some(stores) = self.stores.as_ref() else {
            return Err(StoreError::NotEnabled);
        };

        tokio::try_join!(stores.cache.ping(), stores.metrics.ping())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn disabled_health_check_reports_not_enabled() {
        let manager = StoreManager::disabled();
        assert!(!manager.is_enabled());
        assert!(matches!(
            manager.check_health().await,
            Err(StoreError::NotEnabled)
        ));
    }

    #[tokio::test]
    async fn connect_without_settings_is_disabled() {
        let manager = StoreManager::connect(None).await.expect("disabled manager");
        assert!(!manager.is_enabled());
        assert!(!manager.cache().is_enabled());
        assert!(!manager.ledger().is_enabled());
    }

    #[tokio::test]
    async fn health_check_fails_when_either_database_is_down() {
        let cache = Arc::new(MemoryStore::new());
        let metrics = Arc::new(MemoryStore::new());
        let manager = StoreManager::new(cache.clone(), metrics.clone());

        manager.check_health().await.expect("both up");

        metrics.set_unavailable(true);
        assert!(matches!(
            manager.check_health().await,
            Err(StoreError::Transport(_))
        ));
    }
}
