//! TTL key-value cache with durable backing.
//!
//! Entries are logically absent once `now > written_at + ttl`. Expiry is
//! enforced lazily on read (the read evicts) and proactively by the
//! periodic sweep. Every mutation is mirrored to the durable store under
//! `cache:<key>`; mirror failures are logged and do not fail the
//! in-memory operation (documented durability trade-off).

use crate::events::{EventBus, WalletEvent};
use crate::CoreError;
use drift_store::{KvStore, KvStoreExt};
use drift_types::{Clock, Timestamp};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

const STORE_PREFIX: &str = "cache:";

/// A cached value with its write time and time-to-live.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub written_at: Timestamp,
    pub ttl_millis: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.written_at
            .has_elapsed(Duration::from_millis(self.ttl_millis), now)
    }
}

/// Generic TTL cache, durably backed.
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl CacheStore {
    /// Create the cache, hydrating surviving entries from the durable
    /// store. Entries whose TTL already elapsed are discarded.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        let cache = Self {
            entries: RwLock::new(HashMap::new()),
            store,
            clock,
            events,
        };
        cache.hydrate();
        cache
    }

    fn hydrate(&self) {
        let keys = match self.store.keys_with_prefix(STORE_PREFIX) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "cache hydration failed, starting empty");
                return;
            }
        };

        let now = self.clock.now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        for store_key in keys {
            match self.store.get::<CacheEntry>(&store_key) {
                Ok(Some(entry)) if !entry.is_expired(now) => {
                    entries.insert(entry.key.clone(), entry);
                }
                Ok(_) => {
                    // expired or vanished while hydrating
                    if let Err(e) = self.store.delete(&store_key) {
                        tracing::debug!(key = %store_key, error = %e, "stale cache record not deleted");
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %store_key, error = %e, "unreadable cache record dropped");
                    let _ = self.store.delete(&store_key);
                }
            }
        }
    }

    /// Insert or overwrite an entry. `ttl_secs` must be positive.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: i64) -> Result<(), CoreError> {
        if ttl_secs <= 0 {
            return Err(CoreError::InvalidTtl(ttl_secs));
        }
        let value = serde_json::to_value(value)
            .map_err(|e| CoreError::Config(format!("unserializable cache value: {e}")))?;

        let entry = CacheEntry {
            key: key.to_string(),
            value,
            written_at: self.clock.now(),
            ttl_millis: ttl_secs as u64 * 1000,
        };

        self.mirror_put(&entry);
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key.to_string(), entry);
        Ok(())
    }

    /// Fetch a value. Expired entries behave as absent and are evicted
    /// as a side effect of the read.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().expect("cache lock poisoned");
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => {
                    return serde_json::from_value(entry.value.clone())
                        .map_err(|e| {
                            tracing::warn!(key, error = %e, "cached value failed to deserialize");
                            e
                        })
                        .ok();
                }
                Some(_) => {}
            }
        }
        // read-triggered eviction
        self.remove(key);
        None
    }

    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        let entries = self.entries.read().expect("cache lock poisoned");
        entries.get(key).is_some_and(|entry| !entry.is_expired(now))
    }

    pub fn delete(&self, key: &str) {
        self.remove(key);
    }

    pub fn clear(&self) {
        let keys: Vec<String> = {
            let mut entries = self.entries.write().expect("cache lock poisoned");
            let keys = entries.keys().cloned().collect();
            entries.clear();
            keys
        };
        for key in &keys {
            self.mirror_delete(key);
        }
        self.events.emit(WalletEvent::CacheInvalidated {
            prefix: String::new(),
        });
    }

    /// Remove every entry whose key starts with `prefix`.
    pub fn invalidate_by_prefix(&self, prefix: &str) {
        let removed: Vec<String> = {
            let mut entries = self.entries.write().expect("cache lock poisoned");
            let keys: Vec<String> = entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };
        for key in &removed {
            self.mirror_delete(key);
        }
        self.events.emit(WalletEvent::CacheInvalidated {
            prefix: prefix.to_string(),
        });
    }

    /// Live (non-expired) keys.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let entries = self.entries.read().expect("cache lock poisoned");
        entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Proactively remove expired entries. Returns how many were swept.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<String> = {
            let entries = self.entries.read().expect("cache lock poisoned");
            entries
                .values()
                .filter(|entry| entry.is_expired(now))
                .map(|entry| entry.key.clone())
                .collect()
        };
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(key);
        self.mirror_delete(key);
    }

    fn mirror_put(&self, entry: &CacheEntry) {
        let store_key = format!("{STORE_PREFIX}{}", entry.key);
        if let Err(e) = self.store.put(&store_key, entry) {
            tracing::warn!(key = %entry.key, error = %e, "cache mirror write failed");
        }
    }

    fn mirror_delete(&self, key: &str) {
        let store_key = format!("{STORE_PREFIX}{key}");
        if let Err(e) = self.store.delete(&store_key) {
            tracing::warn!(key, error = %e, "cache mirror delete failed");
        }
    }
}
