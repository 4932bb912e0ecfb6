//! Multi-tier cache for transformed images.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               Orchestrator              │
//! └────────────────────┬────────────────────┘
//!                      │ lookup / store
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TierChain                 │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  │
//! │  │ Memory  │─▶│  Redis  │─▶│   S3    │  │
//! │  │  (LRU)  │  │  (TTL)  │  │(durable)│  │
//! │  └─────────┘  └─────────┘  └─────────┘  │
//! │        ▲ backfill on hit ──────┘        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`CacheKey`] / [`derive_key`]: SHA-256 of `url|options` plus extension
//! - [`CacheTier`]: the interface every tier implements
//! - [`MemoryCache`]: bounded in-process LRU
//! - [`RedisCache`]: distributed tier with TTL on every write
//! - [`S3Cache`]: durable object store tier
//! - [`TierChain`]: ordered probe with promotion and fail-open semantics

mod chain;
mod key;
mod memory;
mod redis;
mod s3;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheTierError;

pub use self::redis::{RedisCache, DEFAULT_REDIS_TTL_SECS};
pub use chain::{CacheEntry, TierChain, DEFAULT_TIER_TIMEOUT};
pub use key::{derive_key, CacheKey, DIGEST_HEX_LEN};
pub use memory::{MemoryCache, DEFAULT_MEMORY_BYTES, DEFAULT_MEMORY_ENTRIES};
pub use s3::{S3Cache, DEFAULT_KEY_PREFIX, DURABLE_CACHE_CONTROL};

/// Cache tiers, ordered fastest to slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// In-process LRU
    Memory,
    /// Networked key-value store
    Distributed,
    /// Object store
    Durable,
}

impl Tier {
    /// Lowercase name, as sent in the `X-Cache-Tier` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Distributed => "distributed",
            Tier::Durable => "durable",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cache tier.
///
/// Implementations report failures as [`CacheTierError`]; the
/// [`TierChain`] decides what to do with them.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Which tier this is.
    fn tier(&self) -> Tier;

    /// Fetch the payload for `key`, or `None` if absent.
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheTierError>;

    /// Store `data` under `key`, replacing any previous value.
    async fn put(&self, key: &CacheKey, data: Bytes, content_type: &str)
        -> Result<(), CacheTierError>;
}
