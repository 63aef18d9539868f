//! Per-deployment rollout counters.
//!
//! Each deployment owns a labels hash of signed counters:
//!
//! - `<label>:Active`: clients currently on the label
//! - `<label>:DeploymentSucceeded`, `<label>:DeploymentFailed`,
//!   `<label>:Downloaded`: reported outcomes
//!
//! [`MetricsLedger`] is the primary interface. [`LegacyClientLabels`] keeps the
//! older per-client bookkeeping reachable without mixing it into transitions.

mod counters;
mod legacy;

pub use counters::{LabelSlot, MetricsLedger};
pub use legacy::LegacyClientLabels;

const METRIC_LEDGER_BATCH: &str = "rollout_store_ledger_batch_total";
const METRIC_LEDGER_SKIPPED: &str = "rollout_store_ledger_skipped_total";
