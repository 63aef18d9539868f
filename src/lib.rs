//! Response caching and deployment rollout counters on top of Redis.
//!
//! - [`cache::ResponseCache`] caches origin responses per (scope key, url) with
//!   one expiry window per scope
//! - [`ledger::MetricsLedger`] keeps per-deployment label counters, updated in
//!   atomic batches
//! - [`keys`] derives every store key and hash field
//! - [`manager::StoreManager`] connects both databases and owns the enable toggle

pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod keys;
pub mod ledger;
pub mod manager;
pub mod store;
