//! Process-local store mirroring the Redis hash semantics the layer relies on.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::lock::keyspace_lock;
use super::{Batch, BatchCommand, KeyValueStore, StoreError};

#[derive(Debug, Clone, Default)]
struct HashEntry {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl HashEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory [`KeyValueStore`].
///
/// Expiry is evaluated lazily against the tokio clock, so tests can pause and
/// advance time. Empty hashes disappear like they do in Redis.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: Mutex<HashMap<String, HashEntry>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent command fail with a transport error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Transport(
                "connection refused: memory store is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn purge_expired(keyspace: &mut HashMap<String, HashEntry>, key: &str) {
    if keyspace
        .get(key)
        .is_some_and(|entry| entry.is_expired(Instant::now()))
    {
        keyspace.remove(key);
    }
}

fn live_entry<'a>(
    keyspace: &'a mut HashMap<String, HashEntry>,
    key: &str,
) -> Option<&'a mut HashEntry> {
    purge_expired(keyspace, key);
    keyspace.get_mut(key)
}

fn increment_field(
    entry: &mut HashEntry,
    key: &str,
    field: &str,
    delta: i64,
) -> Result<i64, StoreError> {
    let current = match entry.fields.get(field) {
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            StoreError::Transport(format!(
                "ERR hash value is not an integer (key `{key}`, field `{field}`)"
            ))
        })?,
        None => 0,
    };
    let next = current.checked_add(delta).ok_or_else(|| {
        StoreError::Transport("ERR increment or decrement would overflow".to_string())
    })?;
    entry.fields.insert(field.to_string(), next.to_string());
    Ok(next)
}

fn stage<'a>(
    staged: &'a mut HashMap<String, HashEntry>,
    keyspace: &HashMap<String, HashEntry>,
    key: &str,
    now: Instant,
) -> &'a mut HashEntry {
    staged.entry(key.to_string()).or_insert_with(|| {
        keyspace
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
            .unwrap_or_default()
    })
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "hash_get");
        Ok(live_entry(&mut keyspace, key).and_then(|entry| entry.fields.get(field).cloned()))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "hash_set");
        purge_expired(&mut keyspace, key);
        keyspace
            .entry(key.to_string())
            .or_default()
            .fields
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "hash_get_all");
        Ok(live_entry(&mut keyspace, key)
            .map(|entry| entry.fields.clone())
            .unwrap_or_default())
    }

    async fn hash_increment_by(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "hash_increment_by");
        purge_expired(&mut keyspace, key);
        let entry = keyspace.entry(key.to_string()).or_default();
        increment_field(entry, key, field, delta)
    }

    async fn hash_delete(&self, key: &str, fields: &[&str]) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "hash_delete");
        let emptied = match live_entry(&mut keyspace, key) {
            Some(entry) => {
                for field in fields {
                    entry.fields.remove(*field);
                }
                entry.fields.is_empty()
            }
            None => false,
        };
        if emptied {
            keyspace.remove(key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "exists");
        Ok(live_entry(&mut keyspace, key).is_some())
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "delete");
        for key in keys {
            keyspace.remove(*key);
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "expire");
        if let Some(entry) = live_entry(&mut keyspace, key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "ttl");
        let now = Instant::now();
        Ok(live_entry(&mut keyspace, key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }

    async fn execute(&self, batch: Batch) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut keyspace = keyspace_lock(&self.keyspace, "execute");
        let now = Instant::now();

        // Commands run against staged copies; nothing is written back unless
        // every command succeeds.
        let mut staged: HashMap<String, HashEntry> = HashMap::new();
        for command in batch.commands() {
            match command {
                BatchCommand::IncrementBy { key, field, delta } => {
                    let entry = stage(&mut staged, &keyspace, key, now);
                    increment_field(entry, key, field, *delta)?;
                }
            }
        }

        keyspace.extend(staged);
        Ok(())
    }
}
