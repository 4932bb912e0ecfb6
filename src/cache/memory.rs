//! In-process memory tier.
//!
//! An LRU cache bounded both by entry count and by the total size of the
//! cached payloads. A single lock guards the LRU list and the byte counter so
//! concurrent puts for the same key always leave one consistent entry.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;

use super::{CacheKey, CacheTier, Tier};
use crate::error::CacheTierError;

/// Default maximum number of entries.
pub const DEFAULT_MEMORY_ENTRIES: usize = 100;

/// Default byte budget: 100MB
pub const DEFAULT_MEMORY_BYTES: usize = 100 * 1024 * 1024;

// =============================================================================
// Memory Cache
// =============================================================================

struct Inner {
    entries: LruCache<String, Bytes>,
    size: usize,
}

/// LRU cache of transformed images.
///
/// # Example
///
/// ```
/// use img_proxy::cache::{derive_key, MemoryCache};
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = MemoryCache::new(10, 1024 * 1024);
///     let key = derive_key("https://example.com/a.jpg", "width=100");
///
///     cache.insert(&key, Bytes::from_static(b"RIFF")).await;
///     assert_eq!(cache.lookup(&key).await, Some(Bytes::from_static(b"RIFF")));
/// }
/// ```
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_bytes: usize,
}

impl MemoryCache {
    /// Create a cache holding at most `max_entries` entries and `max_bytes`
    /// bytes of payload. A zero entry count is treated as one.
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                size: 0,
            }),
            max_bytes,
        }
    }

    /// Get an entry, marking it as recently used.
    pub async fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        let mut inner = self.inner.lock().await;
        inner.entries.get(&key.to_string()).cloned()
    }

    /// Check for an entry without touching LRU order.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        let inner = self.inner.lock().await;
        inner.entries.contains(&key.to_string())
    }

    /// Insert or replace an entry, evicting least-recently-used entries until
    /// both bounds hold.
    ///
    /// A payload larger than the whole byte budget is not cached.
    pub async fn insert(&self, key: &CacheKey, data: Bytes) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let data_size = data.len();

        // Too large to ever fit; drop any older value so it is not served
        if data_size > self.max_bytes {
            if let Some(old) = inner.entries.pop(&key.to_string()) {
                inner.size = inner.size.saturating_sub(old.len());
            }
            return;
        }

        // `push` returns the replaced value for an existing key, or the
        // evicted LRU entry when the entry count is at capacity
        if let Some((_, old)) = inner.entries.push(key.to_string(), data) {
            inner.size = inner.size.saturating_sub(old.len());
        }
        inner.size += data_size;

        while inner.size > self.max_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => inner.size = inner.size.saturating_sub(evicted.len()),
                None => break,
            }
        }
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Total payload bytes currently cached.
    pub async fn size(&self) -> usize {
        self.inner.lock().await.size
    }

    /// Maximum number of entries.
    pub async fn max_entries(&self) -> usize {
        self.inner.lock().await.entries.cap().get()
    }

    /// Byte budget.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_ENTRIES, DEFAULT_MEMORY_BYTES)
    }
}

#[async_trait]
impl CacheTier for MemoryCache {
    fn tier(&self) -> Tier {
        Tier::Memory
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheTierError> {
        Ok(self.lookup(key).await)
    }

    async fn put(
        &self,
        key: &CacheKey,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), CacheTierError> {
        self.insert(key, data).await;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
