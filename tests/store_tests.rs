//! Tests for ExpiringStore
//!
//! These tests verify:
//! - put/get round trips and the default lifetime
//! - TIMEOUT handling with and without delete-on-read
//! - FAILURE for absent keys and engine errors
//! - OVERFLOW when the engine runs out of capacity
//! - remove semantics and return values
//! - Callback delivery
//! - Sweeping expired entries

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use timestore::expiry::DEFAULT_TTL_MS;
use timestore::{
    Config, Envelope, ExpiringStore, ManualClock, MemoryStorage, Status, StorageEngine, StoreError, Ttl,
};

const NOW: u64 = 1_700_000_000_000;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store(delete_expired_on_read: bool) -> (Arc<ManualClock>, ExpiringStore<MemoryStorage>) {
    let clock = Arc::new(ManualClock::new(NOW));
    let config = Config::builder()
        .delete_expired_on_read(delete_expired_on_read)
        .build();
    let store = ExpiringStore::with_clock(MemoryStorage::unbounded(), &config, clock.clone());
    (clock, store)
}

fn stored_envelope(store: &ExpiringStore<MemoryStorage>, key: &str) -> Envelope {
    let raw = store.storage().get_item(key).unwrap().expect("key should be stored");
    Envelope::decode(&raw).unwrap()
}

/// Engine whose operations can be made to fail on demand
#[derive(Default)]
struct FlakyStorage {
    data: Mutex<BTreeMap<String, String>>,
    fail_set: Mutex<Option<fn() -> StoreError>>,
    fail_get: Mutex<bool>,
    fail_remove: Mutex<bool>,
    writes: Mutex<usize>,
}

impl StorageEngine for FlakyStorage {
    fn set_item(&self, key: &str, value: &str) -> timestore::Result<()> {
        *self.writes.lock() += 1;
        if let Some(make_error) = *self.fail_set.lock() {
            return Err(make_error());
        }
        self.data.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn get_item(&self, key: &str) -> timestore::Result<Option<String>> {
        if *self.fail_get.lock() {
            return Err(StoreError::Storage("engine unavailable".into()));
        }
        Ok(self.data.lock().get(key).cloned())
    }

    fn remove_item(&self, key: &str) -> timestore::Result<()> {
        *self.writes.lock() += 1;
        if *self.fail_remove.lock() {
            return Err(StoreError::Storage("engine unavailable".into()));
        }
        self.data.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> timestore::Result<Vec<String>> {
        Ok(self.data.lock().keys().cloned().collect())
    }
}

fn quota_error() -> StoreError {
    StoreError::QuotaExceeded {
        requested: 10,
        quota: 1,
    }
}

fn io_error() -> StoreError {
    StoreError::Storage("disk on fire".into())
}

fn setup_flaky() -> (Arc<FlakyStorage>, ExpiringStore<Arc<FlakyStorage>>) {
    let storage = Arc::new(FlakyStorage::default());
    let store = ExpiringStore::with_clock(
        storage.clone(),
        &Config::default(),
        Arc::new(ManualClock::new(NOW)),
    );
    (storage, store)
}

// =============================================================================
// put / get Tests
// =============================================================================

#[test]
fn test_put_then_get_with_default_ttl() {
    let (_clock, store) = setup_store(true);

    let put = store.put("greeting", "hello", Ttl::new());
    assert_eq!(put.status, Status::Success);
    assert_eq!(put.value, Some(json!("hello")));

    let got = store.get("greeting");
    assert_eq!(got.status, Status::Success);
    assert_eq!(got.value, Some(json!("hello")));

    assert_eq!(stored_envelope(&store, "greeting").expires_at, NOW + DEFAULT_TTL_MS);
}

#[test]
fn test_default_ttl_with_wall_clock() {
    let store = ExpiringStore::in_memory();
    let before = store.now_millis();

    store.put("k", 1, Ttl::new());

    let raw = store.storage().get_item("k").unwrap().unwrap();
    let expires_at = Envelope::decode(&raw).unwrap().expires_at;
    let after = store.now_millis();
    assert!(expires_at >= before + DEFAULT_TTL_MS);
    assert!(expires_at <= after + DEFAULT_TTL_MS);
}

#[test]
fn test_round_trip_preserves_structure() {
    let (_clock, store) = setup_store(true);
    let values = vec![
        json!(true),
        json!(-17.5),
        json!("text"),
        json!([1, "two", null, {"three": 3}]),
        json!({"nested": {"list": [true, false], "text": "ünïcode"}}),
    ];

    for (i, value) in values.into_iter().enumerate() {
        let key = format!("key{}", i);
        store.put(&key, &value, Ttl::new().hours(10).minutes(10));

        let got = store.get(&key);
        assert_eq!(got.status, Status::Success);
        assert_eq!(got.value, Some(value));
    }
}

#[test]
fn test_get_null_value_reads_as_empty_string() {
    let (_clock, store) = setup_store(true);

    store.put("nothing", Value::Null, Ttl::new());

    assert_eq!(store.get("nothing").value, Some(json!("")));
}

#[test]
fn test_get_falsy_values_read_as_empty_string() {
    let (_clock, store) = setup_store(true);

    for (key, value) in [("zero", json!(0)), ("float_zero", json!(0.0)), ("no", json!(false)), ("blank", json!(""))] {
        assert_eq!(store.put(key, &value, Ttl::new()).value, Some(value.clone()));

        let got = store.get(key);
        assert_eq!(got.status, Status::Success, "key {}", key);
        assert_eq!(got.value, Some(json!("")), "key {}", key);
    }

    assert_eq!(store.get_as::<String>("zero").value.as_deref(), Some(""));
}

#[test]
fn test_get_as_typed() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        roles: Vec<String>,
    }

    let (_clock, store) = setup_store(true);
    let session = Session {
        user: "ada".into(),
        roles: vec!["admin".into()],
    };
    store.put("session", &session, Ttl::new());

    let got = store.get_as::<Session>("session");
    assert_eq!(got.status, Status::Success);
    assert_eq!(got.value, Some(session));

    let wrong = store.get_as::<u32>("session");
    assert_eq!(wrong.status, Status::Failure);
    assert!(wrong.value.is_none());
    assert!(wrong.detail.is_some());
}

#[test]
fn test_put_overwrites() {
    let (_clock, store) = setup_store(true);

    store.put("k", "first", Ttl::new());
    store.put("k", "second", Ttl::new());

    assert_eq!(store.get("k").value, Some(json!("second")));
}

#[test]
fn test_never_expires() {
    let (clock, store) = setup_store(true);

    store.put("forever", "still here", Ttl::never());
    clock.advance(10 * 365 * 24 * 60 * 60 * 1000);

    assert_eq!(stored_envelope(&store, "forever").expires_at, 0);
    assert_eq!(store.get("forever").status, Status::Success);
}

#[test]
fn test_expires_exactly_at_instant() {
    let (clock, store) = setup_store(false);

    store.put("k", "v", Ttl::new().minutes(1));
    clock.advance(999);
    assert_eq!(store.get("k").status, Status::Success);

    clock.advance(1);
    assert_eq!(store.get("k").status, Status::Timeout);
}

#[test]
fn test_empty_key_is_rejected() {
    let (_clock, store) = setup_store(true);

    let result = store.put("", "v", Ttl::new());

    assert_eq!(result.status, Status::Failure);
    assert!(store.storage().is_empty());
}

// =============================================================================
// Expiry on Read Tests
// =============================================================================

#[test]
fn test_past_timestamp_times_out_and_is_deleted() {
    let (_clock, store) = setup_store(true);

    store.put("old", "v", Ttl::at(NOW - 1));

    let first = store.get("old");
    assert_eq!(first.status, Status::Timeout);
    assert!(first.value.is_none());

    let second = store.get("old");
    assert_eq!(second.status, Status::Failure);
    assert!(second.value.is_none());
}

#[test]
fn test_past_timestamp_kept_when_delete_disabled() {
    let (_clock, store) = setup_store(false);

    store.put("old", "v", Ttl::at(NOW - 1));

    assert_eq!(store.get("old").status, Status::Timeout);
    assert_eq!(store.get("old").status, Status::Timeout);
    assert!(store.storage().get_item("old").unwrap().is_some());
}

#[test]
fn test_entry_times_out_after_clock_moves() {
    let (clock, store) = setup_store(true);

    store.put("k", "v", Ttl::new().days(2).hours(3).minutes(5));
    assert_eq!(stored_envelope(&store, "k").expires_at, NOW + 1000 * 5 * 3 * 48);

    clock.advance(1000 * 5 * 3 * 48);
    assert_eq!(store.get("k").status, Status::Timeout);
    assert!(store.storage().get_item("k").unwrap().is_none());
}

#[test]
fn test_failed_expiry_delete_still_reports_timeout() {
    let (storage, store) = setup_flaky();

    store.put("k", "v", Ttl::at(1u64));
    *storage.fail_remove.lock() = true;

    assert_eq!(store.get("k").status, Status::Timeout);
}

// =============================================================================
// Failure / Overflow Tests
// =============================================================================

#[test]
fn test_get_missing_key_fails_without_mutation() {
    let (storage, store) = setup_flaky();

    let result = store.get("missing");

    assert_eq!(result.status, Status::Failure);
    assert!(result.value.is_none());
    assert_eq!(*storage.writes.lock(), 0);
}

#[test]
fn test_get_engine_error_is_failure() {
    let (storage, store) = setup_flaky();
    store.put("k", "v", Ttl::new());
    *storage.fail_get.lock() = true;

    let result = store.get("k");

    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.detail.as_deref(), Some("Storage error: engine unavailable"));
}

#[test]
fn test_get_empty_or_malformed_value_is_failure() {
    let (_clock, store) = setup_store(true);
    store.storage().set_item("empty", "").unwrap();
    store.storage().set_item("garbage", "{not json").unwrap();

    assert_eq!(store.get("empty").status, Status::Failure);

    let garbage = store.get("garbage");
    assert_eq!(garbage.status, Status::Failure);
    assert!(garbage.detail.unwrap().starts_with("Serialization error"));
}

#[test]
fn test_get_foreign_document_never_expires() {
    let (_clock, store) = setup_store(true);
    store.storage().set_item("plain", "42").unwrap();
    store
        .storage()
        .set_item("legacy", r#"{"value":"v","timeOut":1}"#)
        .unwrap();

    let plain = store.get("plain");
    assert_eq!(plain.status, Status::Success);
    assert_eq!(plain.value, Some(json!("")));

    assert_eq!(store.get("legacy").status, Status::Timeout);
}

#[test]
fn test_quota_failure_is_overflow_and_nothing_stored() {
    let (storage, store) = setup_flaky();
    *storage.fail_set.lock() = Some(quota_error);

    let result = store.put("big", "v", Ttl::new());

    assert_eq!(result.status, Status::Overflow);
    assert!(result.value.is_none());
    assert_eq!(store.get("big").status, Status::Failure);
}

#[test]
fn test_memory_quota_overflow_keeps_previous_value() {
    let clock = Arc::new(ManualClock::new(NOW));
    let store = ExpiringStore::with_clock(MemoryStorage::new(64), &Config::default(), clock);

    assert_eq!(store.put("k", "small", Ttl::new()).status, Status::Success);

    let big = "x".repeat(128);
    assert_eq!(store.put("k", big, Ttl::new()).status, Status::Overflow);
    assert_eq!(store.get("k").value, Some(json!("small")));
}

#[test]
fn test_other_write_errors_are_failure() {
    let (storage, store) = setup_flaky();
    *storage.fail_set.lock() = Some(io_error);

    let result = store.put("k", "v", Ttl::new());

    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.detail.as_deref(), Some("Storage error: disk on fire"));
}

// =============================================================================
// remove Tests
// =============================================================================

#[test]
fn test_remove_missing_key_fails() {
    let (_clock, store) = setup_store(true);
    let mut seen = Vec::new();

    let result = store.remove_with("missing", |status, value| seen.push((status, value.cloned())));

    assert_eq!(result.status, Status::Failure);
    assert_eq!(seen, vec![(Status::Failure, None)]);
}

#[test]
fn test_remove_live_key_returns_inner_value() {
    let (_clock, store) = setup_store(true);
    store.put("k", json!({"a": 1}), Ttl::new());
    let mut seen = Vec::new();

    let result = store.remove_with("k", |status, value| seen.push((status, value.cloned())));

    assert_eq!(result.status, Status::Success);
    assert_eq!(result.value, Some(json!({"a": 1})));
    assert_eq!(seen, vec![(Status::Success, Some(json!({"a": 1})))]);
    assert_eq!(store.get("k").status, Status::Failure);
}

#[test]
fn test_remove_expired_key_still_succeeds() {
    let (_clock, store) = setup_store(false);
    store.put("k", "v", Ttl::at(1u64));

    let result = store.remove("k");

    assert_eq!(result.status, Status::Success);
    assert_eq!(result.value, Some(json!("v")));
}

#[test]
fn test_remove_foreign_value_returns_raw_text() {
    let (_clock, store) = setup_store(true);
    store.storage().set_item("plain", "just text").unwrap();

    assert_eq!(store.remove("plain").value, Some(json!("just text")));
}

#[test]
fn test_remove_engine_error_is_failure() {
    let (storage, store) = setup_flaky();
    store.put("k", "v", Ttl::new());
    *storage.fail_remove.lock() = true;

    let result = store.remove("k");

    assert_eq!(result.status, Status::Failure);
    assert!(result.value.is_none());
    assert!(storage.get_item("k").unwrap().is_some());
}

// =============================================================================
// Callback Tests
// =============================================================================

#[test]
fn test_put_callback_receives_key_and_envelope() {
    let (_clock, store) = setup_store(true);
    let mut calls = Vec::new();

    store.put_with("k", "v", Ttl::new().minutes(2), |status, key, envelope| {
        calls.push((status, key.to_owned(), envelope.clone()));
    });

    assert_eq!(
        calls,
        vec![(Status::Success, "k".to_owned(), Envelope::new(json!("v"), NOW + 2_000))]
    );
}

#[test]
fn test_put_callback_fires_on_overflow() {
    let (storage, store) = setup_flaky();
    *storage.fail_set.lock() = Some(quota_error);
    let mut statuses = Vec::new();

    store.put_with("k", "v", Ttl::new(), |status, _, _| statuses.push(status));

    assert_eq!(statuses, vec![Status::Overflow]);
}

#[test]
fn test_get_callback_matches_result() {
    let (_clock, store) = setup_store(true);
    store.put("k", "v", Ttl::new());
    store.put("old", "v", Ttl::at(5u64));
    let mut seen = Vec::new();

    for key in ["k", "old", "missing"] {
        let result = store.get_with(key, |status, value| seen.push((status, value.cloned())));
        assert_eq!(seen.last(), Some(&(result.status, result.value.clone())));
    }

    let statuses: Vec<Status> = seen.iter().map(|(status, _)| *status).collect();
    assert_eq!(statuses, vec![Status::Success, Status::Timeout, Status::Failure]);
}

// =============================================================================
// Maintenance Tests
// =============================================================================

#[test]
fn test_purge_expired() {
    let (clock, store) = setup_store(false);
    store.put("short", 1, Ttl::new().minutes(1));
    store.put("long", 2, Ttl::new().days(1));
    store.put("forever", 3, Ttl::never());
    store.storage().set_item("garbage", "{").unwrap();

    clock.advance(10_000);
    assert_eq!(store.purge_expired().unwrap(), 1);

    let mut keys = store.storage().keys().unwrap();
    keys.sort();
    assert_eq!(keys, vec!["forever", "garbage", "long"]);

    clock.advance(24_000);
    assert_eq!(store.purge_expired().unwrap(), 1);
    assert_eq!(store.purge_expired().unwrap(), 0);
}

#[test]
fn test_expiry_for_uses_store_clock() {
    let (_clock, store) = setup_store(true);

    assert_eq!(store.expiry_for(&Ttl::new()), NOW + DEFAULT_TTL_MS);
    assert!(store.delete_expired_on_read());
}
