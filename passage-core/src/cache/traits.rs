//! Core traits for caching functionality

use std::hash::Hash;
use std::time::{Duration, Instant};

/// A cache entry with its expiry
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// Insertion time plus ttl; the entry is dead once `now > expires_at`
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Create a new cache entry living for `ttl`
    pub fn new(value: V, ttl: Duration) -> Self {
        Self { value, expires_at: expiry(Instant::now(), ttl) }
    }

    /// Check if this entry is expired at `now`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Longest lifetime an entry can be given
pub const MAX_LIFETIME: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// `now + ttl`, clamped to [`MAX_LIFETIME`] so huge TTLs never overflow
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_LIFETIME)).unwrap_or(now)
}

/// Outcome of a lookup, distinguishing lazy expiry from a plain miss
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a, V> {
    Hit(&'a V),
    /// The entry existed but had expired; it has been removed
    Expired,
    Miss,
}

/// Core caching trait
pub trait Cache<K, V>
where
    K: Hash + Eq,
{
    /// Look a key up, dropping it if it has expired
    fn lookup(&mut self, key: &K) -> Lookup<'_, V>;

    /// Get a live value from the cache
    fn get(&mut self, key: &K) -> Option<&V> {
        match self.lookup(key) {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired | Lookup::Miss => None,
        }
    }

    /// Insert a value living for `ttl`. Returns the key evicted to make room.
    fn insert(&mut self, key: K, value: V, ttl: Duration) -> Option<K>;

    /// Remove a value from the cache
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Drop every expired entry, returning how many were removed
    fn purge_expired(&mut self) -> usize;

    /// Clear all entries from the cache
    fn clear(&mut self);

    /// Get the number of entries in the cache
    fn len(&self) -> usize;

    /// Check if the cache is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the capacity of the cache
    fn capacity(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_ttl_is_clamped() {
        let before = Instant::now();
        let entry = CacheEntry::new("v", Duration::MAX);
        assert!(entry.expires_at >= before + MAX_LIFETIME);
        assert!(!entry.is_expired_at(Instant::now()));
    }
}
