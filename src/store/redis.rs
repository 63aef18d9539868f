//! Redis-backed transport.

use std::collections::HashMap;
use std::time::Duration;

use ::redis::{AsyncCommands, Client, aio::ConnectionManager};
use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::{Batch, BatchCommand, KeyValueStore, StoreError};

/// One logical Redis database behind a reconnecting multiplexed connection.
///
/// Cheap to clone; clones share the underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    database: u32,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connects to `base_url` and selects `database`.
    ///
    /// Any database path already present in the URL is replaced.
    #[instrument(skip(base_url), fields(host = base_url.host_str().unwrap_or_default()))]
    pub async fn connect(base_url: &Url, database: u32) -> Result<Self, StoreError> {
        let url = database_url(base_url, database);
        let client = Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        debug!(database, "connected to redis");
        Ok(Self { conn, database })
    }

    pub fn database(&self) -> u32 {
        self.database
    }
}

/// Stored bytes that are not UTF-8 are corrupt data, not a transport failure.
fn utf8_value(key: &str, field: &str, raw: Vec<u8>) -> Result<String, StoreError> {
    String::from_utf8(raw).map_err(|err| StoreError::malformed(key, field, err))
}

fn database_url(base_url: &Url, database: u32) -> Url {
    let mut url = base_url.clone();
    url.set_path(&format!("/{database}"));
    url
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.hget(key, field).await?;
        value.map(|raw| utf8_value(key, field, raw)).transpose()
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: HashMap<Vec<u8>, Vec<u8>> = conn.hgetall(key).await?;
        raw.into_iter()
            .map(|(field, value)| {
                let field = String::from_utf8(field).map_err(|err| {
                    StoreError::malformed(
                        key,
                        String::from_utf8_lossy(err.as_bytes()),
                        err.utf8_error(),
                    )
                })?;
                let value = utf8_value(key, &field, value)?;
                Ok((field, value))
            })
            .collect()
    }

    async fn hash_increment_by(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.hincr(key, field, delta).await?;
        Ok(value)
    }

    async fn hash_delete(&self, key: &str, fields: &[&str]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(key, fields.to_vec()).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys.to_vec()).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let seconds = i64::try_from(ttl.as_secs())
            .map_err(|_| StoreError::Transport(format!("expiry out of range: {ttl:?}")))?;
        let mut conn = self.conn.clone();
        let _: () = conn.expire(key, seconds).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        // -2: missing key, -1: no expiry.
        let seconds: i64 = conn.ttl(key).await?;
        Ok(u64::try_from(seconds).ok().map(Duration::from_secs))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn execute(&self, batch: Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = ::redis::pipe();
        pipe.atomic();
        for command in batch.commands() {
            match command {
                BatchCommand::IncrementBy { key, field, delta } => {
                    pipe.hincr(key, field, *delta).ignore();
                }
            }
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_replaces_existing_path() {
        let base = Url::parse("redis://:secret@cache.internal:6380/7").expect("valid url");
        let url = database_url(&base, 1);
        assert_eq!(url.as_str(), "redis://:secret@cache.internal:6380/1");
    }

    #[test]
    fn non_utf8_value_is_malformed_data() {
        let err = utf8_value("deploymentKey:dk", "/updateCheck", vec![0x7b, 0xff, 0xfe])
            .expect_err("invalid utf-8 must not decode");
        assert!(matches!(
            err,
            StoreError::MalformedData { ref key, ref field, .. }
                if key == "deploymentKey:dk" && field == "/updateCheck"
        ));
    }

    #[test]
    fn utf8_value_passes_text_through() {
        let value = utf8_value("k", "f", br#"{"statusCode":200}"#.to_vec()).expect("utf-8");
        assert_eq!(value, r#"{"statusCode":200}"#);
    }

    #[test]
    fn database_url_appends_missing_path() {
        let base = Url::parse("redis://127.0.0.1:6379").expect("valid url");
        assert_eq!(
            database_url(&base, 0).as_str(),
            "redis://127.0.0.1:6379/0"
        );
    }
}
