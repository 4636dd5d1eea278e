use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::{hash::Hash, sync::Arc};

use crate::utils::clock::Clock;

#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Saturates at the latest representable instant instead of overflowing.
    pub fn new(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: now
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// An entry read at exactly `expires_at` is already stale.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Key/value store where every entry lives for the same fixed duration.
///
/// Backed by a `DashMap`, so reads and writes from concurrent requests only
/// contend on the shard holding the key. Nothing is evicted except by expiry
/// or an explicit `delete`.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let hit = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());

        if hit.is_none() {
            // Drop the stale entry so the map stays bounded by live keys.
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        hit
    }

    pub fn set(&self, key: K, value: V) {
        let entry = CacheEntry::new(value, self.clock.now(), self.ttl);
        self.entries.insert(key, entry);
    }

    pub fn delete(&self, key: &K) {
        self.entries.remove(key);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
