//! Live tests against a running Redis server.
//!
//! - Marked `#[ignore]`; run with `cargo test -- --ignored`.
//! - Reads the server URL from `ROLLOUT_STORE_TEST_REDIS_URL`
//!   (for example `redis://127.0.0.1:6379`).
//! - Uses databases 14 and 15 and random deployment keys, removing what it writes.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::AsyncCommands;
use rollout_store::cache::CACHE_EXPIRY;
use rollout_store::domain::SerializedResponse;
use rollout_store::keys::scope_key;
use rollout_store::ledger::LabelSlot;
use rollout_store::manager::StoreManager;
use rollout_store::store::{KeyValueStore, RedisStore, StoreError};
use serde_json::json;
use url::Url;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

const CACHE_DB: u32 = 14;
const METRICS_DB: u32 = 15;

fn redis_url() -> TestResult<Url> {
    let raw = std::env::var("ROLLOUT_STORE_TEST_REDIS_URL")
        .map_err(|_| "ROLLOUT_STORE_TEST_REDIS_URL must be set for live tests")?;
    Ok(Url::parse(&raw)?)
}

async fn connect() -> TestResult<(StoreManager, Arc<RedisStore>)> {
    let url = redis_url()?;
    let cache = Arc::new(RedisStore::connect(&url, CACHE_DB).await?);
    let metrics = Arc::new(RedisStore::connect(&url, METRICS_DB).await?);
    Ok((StoreManager::new(cache.clone(), metrics), cache))
}

fn unique_deployment_key(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("{prefix}-{nanos}")
}

#[tokio::test]
#[ignore]
async fn live_health_check() -> TestResult<()> {
    let (manager, _) = connect().await?;
    manager.check_health().await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_cache_expiry_is_set_once() -> TestResult<()> {
    let (manager, cache_store) = connect().await?;
    let scope = scope_key(&unique_deployment_key("live-cache"));
    let response = SerializedResponse::new(200, json!({ "updateInfo": { "label": "v1" } }));

    manager.cache().set(&scope, "/a", &response).await?;
    let first = manager
        .cache()
        .remaining_ttl(&scope)
        .await?
        .ok_or("expiry missing after first write")?;
    assert!(first <= CACHE_EXPIRY && first > CACHE_EXPIRY - Duration::from_secs(5));

    // Shorten the window by hand; a second write must not restore it.
    cache_store.expire(&scope, Duration::from_secs(120)).await?;
    manager.cache().set(&scope, "/b", &response).await?;
    let second = manager
        .cache()
        .remaining_ttl(&scope)
        .await?
        .ok_or("expiry missing after second write")?;
    assert!(second <= Duration::from_secs(120));

    assert_eq!(manager.cache().get(&scope, "/a").await?, Some(response));

    manager.cache().invalidate(&scope).await?;
    assert_eq!(manager.cache().get(&scope, "/a").await?, None);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_transition_batch_is_applied() -> TestResult<()> {
    let (manager, _) = connect().await?;
    let deployment = unique_deployment_key("live-ledger");
    let ledger = manager.ledger();

    ledger
        .record_transition(LabelSlot::new(&deployment, "v1"), None)
        .await?;
    ledger
        .record_transition(
            LabelSlot::new(&deployment, "v2"),
            Some(LabelSlot::new(&deployment, "v1")),
        )
        .await?;
    ledger
        .increment_status_count(&deployment, "v2", "Downloaded")
        .await?;

    let metrics = ledger.read_metrics(&deployment).await?;
    assert_eq!(metrics.get("v1:Active"), Some(&0));
    assert_eq!(metrics.get("v2:Active"), Some(&1));
    assert_eq!(metrics.get("v2:DeploymentSucceeded"), Some(&1));
    assert_eq!(metrics.get("v2:Downloaded"), Some(&1));

    ledger.clear_metrics(&deployment).await?;
    assert!(ledger.read_metrics(&deployment).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_non_utf8_entry_is_malformed() -> TestResult<()> {
    let (manager, _) = connect().await?;
    let scope = scope_key(&unique_deployment_key("live-bytes"));

    let mut url = redis_url()?;
    url.set_path(&format!("/{CACHE_DB}"));
    let mut raw = redis::Client::open(url.as_str())?
        .get_multiplexed_async_connection()
        .await?;
    let _: () = raw.hset(&scope, "/binary", vec![0x7bu8, 0xff, 0xfe]).await?;

    let result = manager.cache().get(&scope, "/binary").await;
    assert!(matches!(result, Err(StoreError::MalformedData { .. })));

    manager.cache().invalidate(&scope).await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_unreachable_server_is_a_transport_error() -> TestResult<()> {
    let url = Url::parse("redis://127.0.0.1:1")?;
    let result = RedisStore::connect(&url, CACHE_DB).await;
    assert!(matches!(result, Err(StoreError::Transport(_))));
    Ok(())
}
