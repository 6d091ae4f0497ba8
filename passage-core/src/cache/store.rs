//! Shared response cache used by the proxy pipeline

use super::lru::LruCache;
use super::traits::{Cache, Lookup};
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// A replayable response: headers (case-insensitive, last write wins) and body
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(content_type: Option<&str>, body: Bytes) -> Self {
        let mut response = Self { headers: HeaderMap::new(), body };
        if let Some(content_type) = content_type {
            response.set_header(CONTENT_TYPE, content_type);
        }
        response
    }

    /// Set a header, replacing earlier values. Invalid values are skipped.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Approximate footprint: body plus header names and values
    pub fn size(&self) -> usize {
        self.body.len()
            + self.headers.iter().map(|(k, v)| k.as_str().len() + v.len()).sum::<usize>()
    }
}

/// Counters for observability. `hits + misses` equals the number of gets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub max_size: usize,
    pub bytes: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
    evictions: u64,
    expirations: u64,
}

struct Inner {
    entries: LruCache<String, CachedResponse>,
    counters: Counters,
}

/// Bounded TTL cache keyed by a SHA-256 of the normalized target URL
pub struct ResponseCache {
    inner: Mutex<Inner>,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(max_entries),
                counters: Counters::default(),
            }),
            default_ttl,
        }
    }

    /// Hex SHA-256 of the normalized URL.
    ///
    /// Normalization parses and re-serializes the URL (lowercase host, default
    /// port dropped, empty path becomes `/`) and drops the fragment.
    pub fn key_for(url: &str) -> String {
        let normalized = match Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => url.to_string(),
        };
        hex::encode(Sha256::digest(normalized.as_bytes()))
    }

    /// Live entry for `key`; expired entries count as misses and are dropped
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut inner = self.inner.lock().await;
        let Inner { entries, counters } = &mut *inner;

        match entries.lookup(&key.to_string()) {
            Lookup::Hit(response) => {
                counters.hits += 1;
                Some(response.clone())
            }
            Lookup::Expired => {
                counters.misses += 1;
                counters.expirations += 1;
                None
            }
            Lookup::Miss => {
                counters.misses += 1;
                None
            }
        }
    }

    /// Store with the default TTL
    pub async fn set(&self, key: &str, response: CachedResponse) {
        self.set_with_ttl(key, response, self.default_ttl).await;
    }

    /// Store, evicting the least recently accessed entry when full
    pub async fn set_with_ttl(&self, key: &str, response: CachedResponse, ttl: Duration) {
        let mut inner = self.inner.lock().await;
        inner.counters.sets += 1;
        if let Some(evicted) = inner.entries.insert(key.to_string(), response, ttl) {
            inner.counters.evictions += 1;
            log::debug!("Cache full, evicted {}", evicted);
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.entries.remove(&key.to_string()).is_some();
        if removed {
            inner.counters.deletes += 1;
        }
        removed
    }

    /// Sweep expired entries. Returns how many were dropped.
    pub async fn evict_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let purged = inner.entries.purge_expired();
        inner.counters.expirations += purged as u64;
        purged
    }

    pub async fn clear(&self) {
        self.inner.lock().await.entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        let Inner { entries, counters } = &*inner;

        let gets = counters.hits + counters.misses;
        let bytes = entries.iter().map(|(_, response)| response.size()).sum();

        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            deletes: counters.deletes,
            evictions: counters.evictions,
            expirations: counters.expirations,
            size: entries.len(),
            max_size: entries.capacity(),
            bytes,
            hit_rate: if gets == 0 { 0.0 } else { counters.hits as f64 / gets as f64 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &'static str) -> CachedResponse {
        CachedResponse::new(Some("text/html; charset=utf-8"), Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_key_is_normalized_and_opaque() {
        let a = ResponseCache::key_for("http://Example.com");
        let b = ResponseCache::key_for("http://example.com:80/#top");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(!a.contains("example"));
        assert_ne!(a, ResponseCache::key_for("https://example.com/"));
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.set("k", page("<p>hi</p>")).await;

        let hit = cache.get("k").await.unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"<p>hi</p>"));
        assert_eq!(hit.content_type(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.set_with_ttl("k", page("x"), Duration::from_millis(30)).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);

        let stats = cache.stats().await;
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test]
    async fn test_capacity_plus_one_evicts_least_recent() {
        let cache = ResponseCache::new(3, Duration::from_secs(60));
        cache.set("a", page("a")).await;
        cache.set("b", page("b")).await;
        cache.set("c", page("c")).await;
        cache.get("a").await;
        cache.set("d", page("d")).await;

        assert_eq!(cache.len().await, 3);
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_hits_plus_misses_equals_gets() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.set("a", page("a")).await;

        let mut gets = 0;
        for key in ["a", "b", "a", "c", "a"] {
            cache.get(key).await;
            gets += 1;
        }

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits + stats.misses, gets);
        assert!((stats.hit_rate - 0.6).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_delete_and_sweep() {
        let cache = ResponseCache::new(5, Duration::from_secs(60));
        cache.set("keep", page("k")).await;
        cache.set_with_ttl("old", page("o"), Duration::from_millis(10)).await;
        assert!(cache.delete("keep").await);
        assert!(!cache.delete("keep").await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.evict_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_headers_are_case_insensitive_last_write_wins() {
        let mut response = page("x");
        response.set_header(HeaderName::from_static("content-type"), "text/css");
        assert_eq!(response.content_type(), Some("text/css"));
        assert_eq!(response.headers.len(), 1);
    }
}
