//! The Redis-backed store and the permission cache on top of it. Needs a
//! running Redis at `REDIS_URL`; every test returns early without one.

use std::sync::Arc;

use serial_test::serial;
use sidekiq_auth::boards::{BoardId, ProfileId, Role};
use sidekiq_auth::cache::{create_redis_pool, KvStore, PermissionCache, RedisKvStore};
use sidekiq_auth::config::RedisConfig;

fn redis_store() -> Option<RedisKvStore> {
    let url = std::env::var("REDIS_URL").ok().filter(|u| !u.is_empty())?;
    let pool = create_redis_pool(&RedisConfig {
        url: Some(url),
        pool_size: 8,
        connection_timeout_secs: 2,
    })?;
    Some(RedisKvStore::new(pool))
}

fn scratch_key() -> String {
    format!("sidekiq-auth-test:{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[serial]
async fn compare_and_swap_on_absent_key() {
    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let key = scratch_key();

    assert!(!store.compare_and_swap(&key, Some("{}"), "first").await.unwrap());
    assert_eq!(store.get(&key).await.unwrap(), None);

    assert!(store.compare_and_swap(&key, None, "first").await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("first"));

    // Present now, so expecting absence fails.
    assert!(!store.compare_and_swap(&key, None, "second").await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("first"));

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[serial]
async fn compare_and_swap_on_existing_key() {
    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let key = scratch_key();
    store.set(&key, "v1").await.unwrap();

    assert!(!store.compare_and_swap(&key, Some("stale"), "v2").await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v1"));

    assert!(store.compare_and_swap(&key, Some("v1"), "v2").await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v2"));

    store.delete(&key).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_cache_updates_all_land() {
    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let store = Arc::new(store);
    let cache = PermissionCache::with_max_retries(store.clone(), 64);
    let key = scratch_key();

    let mut tasks = Vec::new();
    for n in 0..16u8 {
        let cache = cache.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            cache
                .update(&key, |p| p.insert(BoardId::from_bytes([n; 12]), Role::Author))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let permissions = cache.get_board_permissions(&key).await.unwrap();
    assert_eq!(permissions.len(), 16);
    assert_eq!(permissions.get(BoardId::from_bytes([7; 12])), Some(Role::Author));

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[serial]
async fn role_writes_round_through_redis() {
    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let store = Arc::new(store);
    let cache = PermissionCache::new(store.clone());
    // Well above any real profile id.
    let profile = ProfileId(9_000_000_000 + i64::from(uuid::Uuid::new_v4().as_u128() as u32));
    let key = PermissionCache::key_for(profile);
    let board = BoardId::from_bytes([3; 12]);

    cache.set_role(profile, board, Role::Guest).await.unwrap();
    let raw = store.get(&key).await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json[board.to_hex()], "guest");

    let remaining = cache.remove_board(profile, board).await.unwrap();
    assert!(remaining.is_empty());

    store.delete(&key).await.unwrap();
}
