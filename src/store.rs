//! Expiring Store Facade
//!
//! Wraps a [`StorageEngine`] with per-entry expiration and status-coded
//! results.
//!
//! ## Responsibilities
//! - Compute expiry instants from [`Ttl`] input
//! - Wrap values in an [`Envelope`] and serialize it as JSON
//! - Check expiry on read, optionally deleting expired entries
//! - Classify every outcome into a [`Status`] and notify optional callbacks
//!
//! Engine and parse errors never escape `put`, `get` or `remove`; they become
//! a status, with the error text kept in [`OpResult::detail`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::envelope::Envelope;
use crate::error::{Result, StoreError};
use crate::expiry::{self, Clock, SystemClock, Ttl};
use crate::status::{build_result, Callback, OpResult, Status};
use crate::storage::{MemoryStorage, StorageEngine};

/// Callback receiving the outcome of a `put`: status, key and the envelope built
pub type PutCallback<'a> = &'a mut dyn FnMut(Status, &str, &Envelope);

/// Key-value store with per-entry expiration
///
/// ## Example
/// ```
/// use timestore::{ExpiringStore, Status, Ttl};
///
/// let store = ExpiringStore::in_memory();
/// store.put("session", "abc", Ttl::new().minutes(30));
///
/// let result = store.get("session");
/// assert_eq!(result.status, Status::Success);
/// assert_eq!(result.value, Some("abc".into()));
/// ```
pub struct ExpiringStore<S = MemoryStorage> {
    storage: S,
    delete_expired_on_read: bool,
    clock: Arc<dyn Clock>,
}

impl ExpiringStore<MemoryStorage> {
    /// Unbounded in-memory store with default settings
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::unbounded(), &Config::default())
    }
}

impl<S: StorageEngine> ExpiringStore<S> {
    /// Wrap `storage`, reading the expired-entry policy from `config`
    pub fn new(storage: S, config: &Config) -> Self {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    /// Same as `new` with an explicit time source
    pub fn with_clock(storage: S, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            delete_expired_on_read: config.delete_expired_on_read,
            clock,
        }
    }

    // =========================================================================
    // put
    // =========================================================================

    /// Store `value` under `key` with the lifetime described by `ttl`.
    ///
    /// Returns `Success` with the stored value, or `Overflow` when the engine
    /// is out of capacity. Other engine errors and unserializable values
    /// yield `Failure`.
    pub fn put<V: Serialize>(&self, key: &str, value: V, ttl: Ttl) -> OpResult {
        self.put_inner(key, value, ttl, None)
    }

    /// `put`, then call `callback(status, key, envelope)` whatever the outcome
    pub fn put_with<V, F>(&self, key: &str, value: V, ttl: Ttl, mut callback: F) -> OpResult
    where
        V: Serialize,
        F: FnMut(Status, &str, &Envelope),
    {
        self.put_inner(key, value, ttl, Some(&mut callback))
    }

    fn put_inner<V: Serialize>(&self, key: &str, value: V, ttl: Ttl, callback: Option<PutCallback<'_>>) -> OpResult {
        let expires_at = expiry::compute_expiry(self.clock.now_millis(), &ttl);

        let (envelope, outcome) = match serde_json::to_value(value) {
            Ok(value) => {
                let envelope = Envelope::new(value, expires_at);
                let outcome = self.write_envelope(key, &envelope);
                (envelope, outcome)
            }
            Err(e) => (Envelope::new(Value::Null, expires_at), Err(e.into())),
        };

        let result = match outcome {
            Ok(()) => OpResult::new(Status::Success, Some(envelope.value.clone())),
            Err(e) => {
                let status = if e.is_quota_exceeded() {
                    Status::Overflow
                } else {
                    Status::Failure
                };
                tracing::warn!(key, %status, error = %e, "put failed");
                OpResult::new(status, None).with_detail(e.to_string())
            }
        };

        if let Some(callback) = callback {
            callback(result.status, key, &envelope);
        }
        result
    }

    fn write_envelope(&self, key: &str, envelope: &Envelope) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::Storage("key must not be empty".into()));
        }
        let encoded = envelope.encode()?;
        self.storage.set_item(key, &encoded)
    }

    // =========================================================================
    // get
    // =========================================================================

    /// Read the value under `key`.
    ///
    /// - `Success` with the stored value while live; `null`, `false`, `0`
    ///   and `""` all read back as `""`
    /// - `Timeout` once expired, deleting the entry if configured to
    /// - `Failure` if absent, unreadable, or malformed
    pub fn get(&self, key: &str) -> OpResult {
        self.get_inner(key, None)
    }

    /// `get`, then call `callback(status, value)` with the same outcome
    pub fn get_with<F>(&self, key: &str, mut callback: F) -> OpResult
    where
        F: FnMut(Status, Option<&Value>),
    {
        self.get_inner(key, Some(&mut callback))
    }

    /// `get`, deserializing a live value into `T`.
    ///
    /// A value that does not fit `T` is a `Failure`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> OpResult<T> {
        let OpResult { status, value, detail } = self.get(key);

        match value.map(serde_json::from_value::<T>).transpose() {
            Ok(value) => OpResult { status, value, detail },
            Err(e) => OpResult::new(Status::Failure, None).with_detail(e.to_string()),
        }
    }

    fn get_inner(&self, key: &str, callback: Option<Callback<'_>>) -> OpResult {
        let envelope = match self.read_envelope(key) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                tracing::debug!(key, "get on absent key");
                return build_result(Status::Failure, None, callback);
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "get failed");
                return build_result(Status::Failure, None, callback).with_detail(e.to_string());
            }
        };

        if envelope.is_live(self.clock.now_millis()) {
            let value = if is_falsy(&envelope.value) {
                Value::String(String::new())
            } else {
                envelope.value
            };
            return build_result(Status::Success, Some(value), callback);
        }

        tracing::debug!(key, expires_at = envelope.expires_at, "entry expired");
        if self.delete_expired_on_read {
            if let Err(e) = self.storage.remove_item(key) {
                tracing::warn!(key, error = %e, "failed to delete expired entry");
            }
        }

        build_result(Status::Timeout, None, callback)
    }

    /// Raw read; empty strings count as absent
    fn read_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.storage.get_item(key)?.filter(|raw| !raw.is_empty()))
    }

    fn read_envelope(&self, key: &str) -> Result<Option<Envelope>> {
        self.read_raw(key)?.map(|raw| Envelope::decode(&raw)).transpose()
    }

    // =========================================================================
    // remove
    // =========================================================================

    /// Delete `key`, returning what was stored.
    ///
    /// The value is the envelope's inner value when the stored data has one,
    /// else the raw stored text. Expired entries are removed like live ones.
    pub fn remove(&self, key: &str) -> OpResult {
        self.remove_inner(key, None)
    }

    /// `remove`, then call `callback(status, value)` with the same outcome
    pub fn remove_with<F>(&self, key: &str, mut callback: F) -> OpResult
    where
        F: FnMut(Status, Option<&Value>),
    {
        self.remove_inner(key, Some(&mut callback))
    }

    fn remove_inner(&self, key: &str, callback: Option<Callback<'_>>) -> OpResult {
        let raw = match self.read_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return build_result(Status::Failure, None, callback),
            Err(e) => {
                tracing::warn!(key, error = %e, "remove failed to read");
                return build_result(Status::Failure, None, callback).with_detail(e.to_string());
            }
        };

        if let Err(e) = self.storage.remove_item(key) {
            tracing::warn!(key, error = %e, "remove failed");
            return build_result(Status::Failure, None, callback).with_detail(e.to_string());
        }

        build_result(Status::Success, Some(removed_value(raw)), callback)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Delete every expired entry, returning how many were removed.
    ///
    /// Entries that fail to parse are left alone.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now_millis();
        let mut purged = 0;

        for key in self.storage.keys()? {
            let expired = match self.read_envelope(&key) {
                Ok(Some(envelope)) => !envelope.is_live(now),
                Ok(None) => false,
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "skipping unreadable entry");
                    false
                }
            };

            if expired {
                self.storage.remove_item(&key)?;
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::info!(purged, "purged expired entries");
        }
        Ok(purged)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn delete_expired_on_read(&self) -> bool {
        self.delete_expired_on_read
    }

    /// Current time according to this store's clock
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Expiry instant `ttl` would produce if written now
    pub fn expiry_for(&self, ttl: &Ttl) -> u64 {
        expiry::compute_expiry(self.clock.now_millis(), ttl)
    }
}

/// `null`, `false`, zero and the empty string
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Value reported by a successful remove
fn removed_value(raw: String) -> Value {
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(mut fields)) => match fields.remove("value") {
            Some(value) if !value.is_null() => value,
            _ => Value::String(raw),
        },
        _ => Value::String(raw),
    }
}
