//! Ordered multi-tier lookup with promotion.
//!
//! # Protocol
//!
//! - Lookup probes tiers fastest first. On a hit at tier T, every tier
//!   faster than T is written before the lookup returns.
//! - Store writes every tier concurrently.
//! - Every tier call is bounded by a deadline. Errors and timeouts are
//!   logged and treated as a miss (reads) or ignored (writes).

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, warn};

use super::{CacheKey, CacheTier, Tier};
use crate::error::CacheTierError;

/// Default per-call deadline for a tier.
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_millis(2000);

/// A cached payload and the tier it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Encoded image bytes
    pub data: Bytes,

    /// MIME type of `data`
    pub content_type: String,

    /// Tier that answered the lookup
    pub tier: Tier,
}

/// Ordered chain of cache tiers.
pub struct TierChain {
    tiers: Vec<Arc<dyn CacheTier>>,
    timeout: Duration,
}

impl TierChain {
    /// Create an empty chain with the given per-call deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            tiers: Vec::new(),
            timeout,
        }
    }

    /// Add a tier. Tiers are kept ordered fastest first regardless of the
    /// order they are added in.
    pub fn with_tier(mut self, tier: Arc<dyn CacheTier>) -> Self {
        self.tiers.push(tier);
        self.tiers.sort_by_key(|t| t.tier());
        self
    }

    /// Tiers in probe order.
    pub fn tiers(&self) -> Vec<Tier> {
        self.tiers.iter().map(|t| t.tier()).collect()
    }

    /// Per-call deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe every tier in order and promote a hit into the faster tiers.
    ///
    /// Returns `None` when no tier has the key.
    pub async fn lookup(&self, key: &CacheKey, content_type: &str) -> Option<CacheEntry> {
        for (index, tier) in self.tiers.iter().enumerate() {
            let name = tier.tier();
            let start = Instant::now();

            match self.bounded(tier.get(key)).await {
                Ok(Some(data)) => {
                    debug!(
                        key = %key,
                        tier = %name,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Cache hit"
                    );
                    self.backfill(&self.tiers[..index], key, &data, content_type)
                        .await;
                    return Some(CacheEntry {
                        data,
                        content_type: content_type.to_string(),
                        tier: name,
                    });
                }
                Ok(None) => {
                    debug!(key = %key, tier = %name, "Cache miss");
                }
                Err(e) => {
                    warn!(key = %key, tier = %name, error = %e, "Cache read failed, treating as miss");
                }
            }
        }

        None
    }

    /// Write `data` to every tier concurrently.
    pub async fn store(&self, key: &CacheKey, data: &Bytes, content_type: &str) {
        self.write_all(&self.tiers, key, data, content_type).await;
    }

    async fn backfill(
        &self,
        faster: &[Arc<dyn CacheTier>],
        key: &CacheKey,
        data: &Bytes,
        content_type: &str,
    ) {
        if faster.is_empty() {
            return;
        }
        self.write_all(faster, key, data, content_type).await;
    }

    async fn write_all(
        &self,
        tiers: &[Arc<dyn CacheTier>],
        key: &CacheKey,
        data: &Bytes,
        content_type: &str,
    ) {
        let writes = tiers.iter().map(|tier| async move {
            let name = tier.tier();
            match self.bounded(tier.put(key, data.clone(), content_type)).await {
                Ok(()) => debug!(key = %key, tier = %name, bytes = data.len(), "Cache write"),
                Err(e) => {
                    warn!(key = %key, tier = %name, error = %e, "Cache write failed, ignoring")
                }
            }
        });

        join_all(writes).await;
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheTierError>>,
    ) -> Result<T, CacheTierError> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheTierError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}
