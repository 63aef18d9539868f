//! Per-client label bookkeeping from the older counting scheme.
//!
//! Kept for callers that still maintain the clients hash. Active counts are
//! owned by [`MetricsLedger::record_transition`](super::MetricsLedger::record_transition);
//! nothing here touches the labels hash, so using both interfaces for the same
//! event cannot double-count.

use std::sync::Arc;

use metrics::counter;
use tracing::instrument;

use crate::keys::clients_hash_key;
use crate::store::{KeyValueStore, StoreError};

use super::METRIC_LEDGER_BATCH;

/// Legacy `clientUniqueId -> label` mapping per deployment.
#[derive(Clone)]
pub struct LegacyClientLabels {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl LegacyClientLabels {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Label last recorded for the client, if any.
    pub async fn client_active_label(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
    ) -> Result<Option<String>, StoreError> {
        match self.store.as_ref() {
            Some(store) => {
                store
                    .hash_get(&clients_hash_key(deployment_key), client_unique_id)
                    .await
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn set_client_active_label(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
        label: &str,
    ) -> Result<(), StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        store
            .hash_set(&clients_hash_key(deployment_key), client_unique_id, label)
            .await?;
        counter!(METRIC_LEDGER_BATCH, "op" => "legacy_set_label").increment(1);
        Ok(())
    }

    /// Forgets the label recorded for one client.
    #[instrument(skip(self))]
    pub async fn remove_client_active_label(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
    ) -> Result<(), StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        store
            .hash_delete(&clients_hash_key(deployment_key), &[client_unique_id])
            .await?;
        counter!(METRIC_LEDGER_BATCH, "op" => "legacy_remove_label").increment(1);
        Ok(())
    }
}
