//! Response cache behaviour over the in-memory transport.
//!
//! - Expiry is assigned once per scope and never refreshed by later writes.
//! - Tests run on a paused tokio clock so expiry is deterministic.

use std::sync::Arc;
use std::time::Duration;

use rollout_store::cache::{CACHE_EXPIRY, ResponseCache};
use rollout_store::domain::SerializedResponse;
use rollout_store::keys::scope_key;
use rollout_store::store::{KeyValueStore, MemoryStore};
use serde_json::json;

fn cache() -> (ResponseCache, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (ResponseCache::new(store.clone()), store)
}

fn update_response(label: &str) -> SerializedResponse {
    SerializedResponse::new(
        200,
        json!({ "updateInfo": { "isAvailable": true, "label": label } }),
    )
}

#[tokio::test(start_paused = true)]
async fn first_write_assigns_the_scope_expiry() {
    let (cache, _) = cache();
    let scope = scope_key("dk-prod");

    assert!(cache.remaining_ttl(&scope).await.expect("ttl").is_none());

    cache
        .set(&scope, "/updateCheck?label=v1", &update_response("v2"))
        .await
        .expect("set");

    let ttl = cache
        .remaining_ttl(&scope)
        .await
        .expect("ttl")
        .expect("expiry assigned");
    assert_eq!(ttl, CACHE_EXPIRY);
}

#[tokio::test(start_paused = true)]
async fn later_writes_keep_the_original_window() {
    let (cache, _) = cache();
    let scope = scope_key("dk-prod");

    cache
        .set(&scope, "/updateCheck?label=v1", &update_response("v2"))
        .await
        .expect("first set");

    tokio::time::advance(Duration::from_secs(1800)).await;

    cache
        .set(&scope, "/updateCheck?label=v2", &update_response("v3"))
        .await
        .expect("second set");
    cache
        .set(&scope, "/updateCheck?label=v1", &update_response("v3"))
        .await
        .expect("overwrite");

    let ttl = cache
        .remaining_ttl(&scope)
        .await
        .expect("ttl")
        .expect("expiry still present");
    assert_eq!(ttl, Duration::from_secs(1800));

    let overwritten = cache
        .get(&scope, "/updateCheck?label=v1")
        .await
        .expect("get")
        .expect("entry");
    assert_eq!(overwritten, update_response("v3"));
}

#[tokio::test(start_paused = true)]
async fn every_url_in_a_scope_expires_together() {
    let (cache, store) = cache();
    let scope = scope_key("dk-prod");

    cache
        .set(&scope, "/a", &update_response("v1"))
        .await
        .expect("set a");
    tokio::time::advance(Duration::from_secs(3000)).await;
    cache
        .set(&scope, "/b", &update_response("v1"))
        .await
        .expect("set b");

    tokio::time::advance(Duration::from_secs(601)).await;

    assert!(cache.get(&scope, "/a").await.expect("get a").is_none());
    assert!(cache.get(&scope, "/b").await.expect("get b").is_none());
    assert!(!store.exists(&scope).await.expect("exists"));
}

#[tokio::test(start_paused = true)]
async fn write_after_expiry_opens_a_new_window() {
    let (cache, _) = cache();
    let scope = scope_key("dk-prod");

    cache
        .set(&scope, "/a", &update_response("v1"))
        .await
        .expect("set");
    tokio::time::advance(CACHE_EXPIRY + Duration::from_secs(1)).await;

    cache
        .set(&scope, "/a", &update_response("v2"))
        .await
        .expect("set after expiry");
    assert_eq!(
        cache.remaining_ttl(&scope).await.expect("ttl"),
        Some(CACHE_EXPIRY)
    );
}

#[tokio::test(start_paused = true)]
async fn scope_without_expiry_stays_until_invalidated() {
    let (cache, store) = cache();
    let scope = scope_key("dk-prod");

    // A scope whose expiry was never applied after its first write.
    let first = update_response("v1");
    store
        .hash_set(&scope, "/a", &first.encode().expect("encode"))
        .await
        .expect("seed");

    cache
        .set(&scope, "/b", &update_response("v2"))
        .await
        .expect("set");
    assert!(cache.remaining_ttl(&scope).await.expect("ttl").is_none());

    tokio::time::advance(CACHE_EXPIRY * 2).await;
    assert_eq!(
        cache.get(&scope, "/a").await.expect("get a"),
        Some(first)
    );

    cache.invalidate(&scope).await.expect("invalidate");
    assert!(!store.exists(&scope).await.expect("exists"));
}

#[tokio::test]
async fn scopes_are_isolated_per_deployment() {
    let (cache, _) = cache();
    let prod = scope_key("prod");
    let staging = scope_key("staging");

    cache
        .set(&prod, "/updateCheck", &update_response("v5"))
        .await
        .expect("set prod");
    cache
        .set(&staging, "/updateCheck", &update_response("v6"))
        .await
        .expect("set staging");

    cache.invalidate(&prod).await.expect("invalidate prod");

    assert!(cache.get(&prod, "/updateCheck").await.expect("get").is_none());
    assert_eq!(
        cache
            .get(&staging, "/updateCheck")
            .await
            .expect("get")
            .expect("staging entry"),
        update_response("v6")
    );
}

#[tokio::test]
async fn error_responses_are_cached_verbatim() {
    let (cache, _) = cache();
    let scope = scope_key("dk");
    let response = SerializedResponse::new(404, json!("Not found"));

    cache.set(&scope, "/missing", &response).await.expect("set");

    let cached = cache
        .get(&scope, "/missing")
        .await
        .expect("get")
        .expect("entry");
    assert_eq!(cached.status_code, 404);
    assert_eq!(cached.body, json!("Not found"));
}
