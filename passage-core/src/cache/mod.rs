//! Response caching for the proxy
//!
//! [`LruCache`] is the generic recency-ordered store with per-entry TTL;
//! [`ResponseCache`] wraps it behind a lock with URL-hash keys and counters.

pub mod lru;
pub mod store;
pub mod traits;

pub use lru::LruCache;
pub use store::{CacheStats, CachedResponse, ResponseCache};
pub use traits::{Cache, CacheEntry, Lookup};
