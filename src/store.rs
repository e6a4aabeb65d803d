use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::{Duration, Instant};

/// The Store is responsible for managing key-value pairs, with optional time-to-live settings for
/// each key. Expiration is lazy: an expired key is only removed when a lookup observes it, there
/// is no background task sweeping keys.
///
/// The store can be shared and cloned cheaply using reference counting. All access goes through
/// [`Store::lock`], so every `get` (which may delete) and `set` is atomic with respect to other
/// connections.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<State>>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub fn lock(&self) -> StoreLocked<'_> {
        // No operation can leave the map half-updated, so a poisoned lock is still usable.
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        StoreLocked { state }
    }
}

pub struct StoreLocked<'a> {
    state: MutexGuard<'a, State>,
}

impl<'a> StoreLocked<'a> {
    /// Sets `key` to `data` without expiration, replacing any previous value and TTL.
    pub fn set(&mut self, key: Bytes, data: Bytes) {
        let value = Value {
            data,
            expires_at: None,
        };
        self.state.keys.insert(key, value);
    }

    /// Sets `key` to `data`, expiring `ttl` from now.
    pub fn set_with_ttl(&mut self, key: Bytes, data: Bytes, ttl: Duration) {
        let value = Value {
            data,
            expires_at: Some(Instant::now() + ttl),
        };
        self.state.keys.insert(key, value);
    }

    /// Returns the value of `key`, removing it first if it has expired.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        let now = Instant::now();

        let expired = self.state.keys.get(key)?.is_expired(now);
        if expired {
            self.state.keys.remove(key);
            return None;
        }

        self.state.keys.get(key).map(|value| value.data.clone())
    }

    /// Whether `key` is held in memory, expired or not.
    #[cfg(test)]
    fn contains(&self, key: &[u8]) -> bool {
        self.state.keys.contains_key(key)
    }

    #[cfg(test)]
    fn size(&self) -> usize {
        self.state.keys.len()
    }
}

#[derive(Debug)]
pub struct Value {
    pub data: Bytes,
    pub expires_at: Option<Instant>,
}

impl Value {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |expires_at| now >= expires_at)
    }
}

#[derive(Default)]
struct State {
    keys: HashMap<Bytes, Value>,
}
