//! Response cache storage on top of the cache database.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, instrument};

use crate::domain::SerializedResponse;
use crate::store::{KeyValueStore, StoreError};

/// Expiry applied once to a scope key when its first entry is written.
pub const CACHE_EXPIRY: Duration = Duration::from_secs(3600);

const METRIC_CACHE_HIT: &str = "rollout_store_cache_hit_total";
const METRIC_CACHE_MISS: &str = "rollout_store_cache_miss_total";
const METRIC_CACHE_WRITE: &str = "rollout_store_cache_write_total";
const METRIC_CACHE_EXPIRY_SET: &str = "rollout_store_cache_expiry_set_total";
const METRIC_CACHE_INVALIDATE: &str = "rollout_store_cache_invalidate_total";

/// Response cache keyed by (scope key, url).
///
/// A disabled cache answers every lookup with a miss and accepts every write
/// without touching a store, so callers never special-case it.
#[derive(Clone)]
pub struct ResponseCache {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Looks up the cached response for `url` under `scope_key`.
    ///
    /// A missing entry is `Ok(None)`; an entry that does not decode is
    /// [`StoreError::MalformedData`].
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        scope_key: &str,
        url: &str,
    ) -> Result<Option<SerializedResponse>, StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(None);
        };

        let Some(raw) = store.hash_get(scope_key, url).await? else {
            counter!(METRIC_CACHE_MISS).increment(1);
            debug!(outcome = "miss", "response cache lookup");
            return Ok(None);
        };

        let response = SerializedResponse::decode(&raw)
            .map_err(|err| StoreError::malformed(scope_key, url, err))?;
        counter!(METRIC_CACHE_HIT).increment(1);
        debug!(outcome = "hit", "response cache lookup");
        Ok(Some(response))
    }

    /// Caches `response` for `url`, overwriting any previous entry.
    ///
    /// The scope key gets [`CACHE_EXPIRY`] only when it did not exist before
    /// this write. Later writes leave the original window untouched. The
    /// existence check, the write and the expiry are separate commands.
    ///
    /// A scope that ends up without an expiry stays permanent: the key expired
    /// between the check and the write, or the expiry command failed after the
    /// write succeeded. Later writes see an existing key and never assign one,
    /// so such a scope lives until [`ResponseCache::invalidate`].
    #[instrument(skip(self, response), fields(status_code = response.status_code))]
    pub async fn set(
        &self,
        scope_key: &str,
        url: &str,
        response: &SerializedResponse,
    ) -> Result<(), StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        let encoded = response
            .encode()
            .map_err(|err| StoreError::malformed(scope_key, url, err))?;

        let is_new_key = !store.exists(scope_key).await?;
        store.hash_set(scope_key, url, &encoded).await?;
        counter!(METRIC_CACHE_WRITE).increment(1);

        if is_new_key {
            store.expire(scope_key, CACHE_EXPIRY).await?;
            counter!(METRIC_CACHE_EXPIRY_SET).increment(1);
            debug!(
                expiry_secs = CACHE_EXPIRY.as_secs(),
                "expiry assigned to new cache scope"
            );
        }
        Ok(())
    }

    /// Drops every cached URL under `scope_key`.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, scope_key: &str) -> Result<(), StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        store.delete(&[scope_key]).await?;
        counter!(METRIC_CACHE_INVALIDATE).increment(1);
        Ok(())
    }

    /// Remaining lifetime of a cache scope; `None` when absent or disabled.
    pub async fn remaining_ttl(&self, scope_key: &str) -> Result<Option<Duration>, StoreError> {
        match self.store.as_ref() {
            Some(store) => store.ttl(scope_key).await,
            None => Ok(None),
        }
    }
}
