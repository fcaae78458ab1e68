//! Runs against a live server named by `BLOCKER_TEST_REDIS_URL`
//! (default `redis://127.0.0.1/`). Enable with `--features integration_tests`.

use blocker::clock::{FixedClock, SystemClock};
use blocker::error::BlockingError;
use blocker::manager::BlockManager;
use blocker::owner::ValueOwnerFactory;
use blocker::storage::{KeyValueStorage, KeyValueStore, RedisStore, Storage};
use blocker::validator::ExpiredValidator;
use chrono::{TimeDelta, Utc};
use std::sync::{Arc, Barrier};
use std::thread;

fn redis_url() -> String {
    std::env::var("BLOCKER_TEST_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string())
}

/// A storage under a prefix unique to this test run.
fn storage() -> Arc<KeyValueStorage<RedisStore>> {
    let prefix = format!("blocker-test-{}", uuid::Uuid::new_v4());
    Arc::new(KeyValueStorage::new(
        RedisStore::open(&redis_url()).unwrap(),
        prefix,
    ))
}

#[test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
fn test_redis_store_primitives() {
    let store = RedisStore::open(&redis_url()).unwrap();
    let key = format!("blocker-test-{}", uuid::Uuid::new_v4());

    assert_eq!(store.get(&key).unwrap(), None);
    assert!(store.set_if_absent(&key, "one").unwrap());
    assert!(!store.set_if_absent(&key, "two").unwrap());
    assert!(!store.compare_and_set(&key, "two", "three").unwrap());
    assert!(store.compare_and_set(&key, "one", "three").unwrap());
    assert_eq!(store.get(&key).unwrap().as_deref(), Some("three"));
    assert!(!store.compare_and_delete(&key, "one").unwrap());
    assert!(store.compare_and_delete(&key, "three").unwrap());
    assert_eq!(store.get(&key).unwrap(), None);
}

#[test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
fn test_redis_lifecycle() {
    let storage = storage();
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let manager_for = |owner: &str| {
        BlockManager::new(
            Arc::new(ValueOwnerFactory::new(owner).unwrap()),
            storage.clone(),
            ExpiredValidator::new(30, clock.clone()),
        )
    };
    let alice = manager_for("alice");
    let bob = manager_for("bob");

    let block = alice.acquire("doc").unwrap();
    assert_eq!(storage.read("doc").unwrap(), Some(block));
    assert!(matches!(
        bob.acquire("doc"),
        Err(BlockingError::BlockHeld { .. })
    ));

    clock.advance(TimeDelta::seconds(30));
    assert_eq!(bob.acquire("doc").unwrap().owner(), "bob");
    assert!(!alice.release("doc").unwrap());
    assert!(bob.release("doc").unwrap());
    assert_eq!(storage.read("doc").unwrap(), None);
}

#[test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
fn test_unreachable_server_is_storage_error() {
    let storage = KeyValueStorage::new(RedisStore::open("redis://127.0.0.1:1/").unwrap(), "block");
    assert!(matches!(
        storage.read("doc"),
        Err(BlockingError::Storage { backend: "key_value", .. })
    ));
}

#[test]
#[cfg_attr(not(feature = "integration_tests"), ignore)]
fn test_redis_concurrent_acquire_has_single_winner() {
    const CONTENDERS: usize = 8;
    let prefix = format!("blocker-test-{}", uuid::Uuid::new_v4());
    let barrier = Arc::new(Barrier::new(CONTENDERS));

    // One client per contender, as separate processes would have.
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|idx| {
            let storage = Arc::new(KeyValueStorage::new(
                RedisStore::open(&redis_url()).unwrap(),
                prefix.as_str(),
            ));
            let manager = BlockManager::new(
                Arc::new(ValueOwnerFactory::new(format!("worker-{idx}")).unwrap()),
                storage,
                ExpiredValidator::new(60, Arc::new(SystemClock)),
            );
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.acquire("shared-report")
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.join().unwrap() {
            Ok(block) => winners.push(block),
            Err(BlockingError::BlockHeld { .. } | BlockingError::AcquireConflict { .. }) => {}
            Err(other) => panic!("Unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1);
    let storage = KeyValueStorage::new(RedisStore::open(&redis_url()).unwrap(), prefix);
    assert_eq!(storage.read("shared-report").unwrap(), Some(winners[0].clone()));
    assert!(storage.delete("shared-report", winners[0].owner()).unwrap());
}
