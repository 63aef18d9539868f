//! Key-value transport consumed by the cache and metrics layers.
//!
//! `KeyValueStore` exposes the hash, key and batch primitives both components
//! need. Two implementations ship with the crate:
//!
//! - [`RedisStore`]: the production transport, one instance per logical database
//! - [`MemoryStore`]: a process-local store with the same semantics, used by
//!   tests and local development

mod error;
mod lock;
mod memory;
mod redis;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

pub use self::redis::RedisStore;
pub use error::StoreError;
pub use memory::MemoryStore;

/// A single command inside an atomic [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchCommand {
    /// `HINCRBY key field delta`
    IncrementBy {
        key: String,
        field: String,
        delta: i64,
    },
}

/// An ordered group of commands that commits all-or-nothing.
///
/// Commands may touch several keys; the store applies the whole batch
/// indivisibly relative to every other batch or command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<BatchCommand>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_by(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        delta: i64,
    ) -> &mut Self {
        self.commands.push(BatchCommand::IncrementBy {
            key: key.into(),
            field: field.into(),
            delta,
        });
        self
    }

    pub fn commands(&self) -> &[BatchCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Remote key-value store primitives.
///
/// Implementations surface failures as [`StoreError::Transport`] and never
/// retry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Adds `delta` to an integer field, creating it at zero first. Returns the new value.
    async fn hash_increment_by(&self, key: &str, field: &str, delta: i64)
    -> Result<i64, StoreError>;

    async fn hash_delete(&self, key: &str, fields: &[&str]) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remaining time to live; `None` when the key is missing or never expires.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Applies every command of `batch` atomically.
    async fn execute(&self, batch: Batch) -> Result<(), StoreError>;
}
