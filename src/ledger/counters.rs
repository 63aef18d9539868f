use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, instrument};

use crate::domain::DeploymentStatus;
use crate::keys::{
    clients_hash_key, label_active_field, label_status_field, labels_hash_key, status_field,
};
use crate::store::{Batch, KeyValueStore, StoreError};

use super::{METRIC_LEDGER_BATCH, METRIC_LEDGER_SKIPPED};

/// A (deployment, label) pair a client is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSlot<'a> {
    pub deployment_key: &'a str,
    pub label: &'a str,
}

impl<'a> LabelSlot<'a> {
    pub fn new(deployment_key: &'a str, label: &'a str) -> Self {
        Self {
            deployment_key,
            label,
        }
    }
}

/// Rollout counters stored in the metrics database.
///
/// Invalid input (unknown status, empty label) is dropped without an error so
/// metrics collection never interrupts the request it instruments. A disabled
/// ledger returns defaults for every call.
#[derive(Clone)]
pub struct MetricsLedger {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl MetricsLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Adds one to `label:status` in the deployment's labels hash.
    #[instrument(skip(self))]
    pub async fn increment_status_count(
        &self,
        deployment_key: &str,
        label: &str,
        status: &str,
    ) -> Result<(), StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        let Some(field) = label_status_field(label, status) else {
            let reason = if label.is_empty() {
                "empty_label"
            } else {
                "invalid_status"
            };
            counter!(METRIC_LEDGER_SKIPPED, "reason" => reason).increment(1);
            debug!(reason, "status count skipped");
            return Ok(());
        };

        store
            .hash_increment_by(&labels_hash_key(deployment_key), &field, 1)
            .await?;
        counter!(METRIC_LEDGER_BATCH, "op" => "increment_status").increment(1);
        Ok(())
    }

    /// Moves one client onto `current`, away from `previous` if it had one.
    ///
    /// In a single atomic batch: `current.label:Active` and
    /// `current.label:DeploymentSucceeded` go up by one, and
    /// `previous.label:Active` goes down by one. A reader never observes a
    /// subset of these deltas.
    #[instrument(skip(self))]
    pub async fn record_transition(
        &self,
        current: LabelSlot<'_>,
        previous: Option<LabelSlot<'_>>,
    ) -> Result<(), StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        let Some(batch) = transition_batch(current, previous) else {
            counter!(METRIC_LEDGER_SKIPPED, "reason" => "empty_label").increment(1);
            debug!("transition skipped: current label is empty");
            return Ok(());
        };

        let commands = batch.len();
        store.execute(batch).await?;
        counter!(METRIC_LEDGER_BATCH, "op" => "record_transition").increment(1);
        debug!(commands, "transition recorded");
        Ok(())
    }

    /// Deletes the labels and clients hashes of a decommissioned deployment.
    #[instrument(skip(self))]
    pub async fn clear_metrics(&self, deployment_key: &str) -> Result<(), StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        let labels = labels_hash_key(deployment_key);
        let clients = clients_hash_key(deployment_key);
        store.delete(&[labels.as_str(), clients.as_str()]).await?;
        counter!(METRIC_LEDGER_BATCH, "op" => "clear").increment(1);
        Ok(())
    }

    /// Every counter of the deployment's labels hash.
    ///
    /// A stored value that is not an integer fails with
    /// [`StoreError::MalformedData`]; it is never read as zero.
    #[instrument(skip(self))]
    pub async fn read_metrics(
        &self,
        deployment_key: &str,
    ) -> Result<HashMap<String, i64>, StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(HashMap::new());
        };

        let key = labels_hash_key(deployment_key);
        let raw = store.hash_get_all(&key).await?;
        raw.into_iter()
            .map(|(field, value)| match value.parse::<i64>() {
                Ok(count) => Ok((field, count)),
                Err(err) => Err(StoreError::malformed(key.as_str(), field, err)),
            })
            .collect()
    }
}

fn transition_batch(current: LabelSlot<'_>, previous: Option<LabelSlot<'_>>) -> Option<Batch> {
    let active = label_active_field(current.label)?;
    let succeeded = status_field(current.label, DeploymentStatus::Succeeded)?;
    let current_hash = labels_hash_key(current.deployment_key);

    let mut batch = Batch::new();
    batch
        .increment_by(current_hash.clone(), active, 1)
        .increment_by(current_hash, succeeded, 1);

    let previous = previous.and_then(|slot| {
        let field = label_active_field(slot.label)?;
        Some((labels_hash_key(slot.deployment_key), field))
    });
    if let Some((previous_hash, previous_active)) = previous {
        batch.increment_by(previous_hash, previous_active, -1);
    }

    Some(batch)
}
