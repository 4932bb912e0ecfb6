//! Tier chain integration tests.
//!
//! These run the proxy over a real memory tier plus mock distributed and
//! durable tiers to check promotion, write-through, fail-open behavior and
//! request coalescing.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use img_proxy::cache::{derive_key, MemoryCache, Tier, TierChain, DEFAULT_TIER_TIMEOUT};
use img_proxy::error::ProxyError;
use img_proxy::proxy::ImageProxy;

use super::test_utils::{create_png, dimensions, MockOrigin, MockTier};

const SOURCE_URL: &str = "https://example.com/photo.png";
const OPTIONS: &str = "width=100,format=png";

struct Harness {
    proxy: ImageProxy<MockOrigin>,
    origin: MockOrigin,
    memory: Arc<MemoryCache>,
    distributed: Arc<MockTier>,
    durable: Arc<MockTier>,
}

fn harness_with(distributed: MockTier, durable: MockTier, timeout: Duration) -> Harness {
    let origin = MockOrigin::new();
    let memory = Arc::new(MemoryCache::default());
    let distributed = Arc::new(distributed);
    let durable = Arc::new(durable);

    // Registered out of order; the chain sorts by tier
    let chain = TierChain::new(timeout)
        .with_tier(durable.clone())
        .with_tier(memory.clone())
        .with_tier(distributed.clone());

    Harness {
        proxy: ImageProxy::new(chain, origin.clone()),
        origin,
        memory,
        distributed,
        durable,
    }
}

fn harness() -> Harness {
    harness_with(
        MockTier::new(Tier::Distributed),
        MockTier::new(Tier::Durable),
        DEFAULT_TIER_TIMEOUT,
    )
}

// =============================================================================
// Lookup Order & Promotion
// =============================================================================

#[tokio::test]
async fn test_chain_orders_tiers() {
    let h = harness();
    assert_eq!(
        h.proxy.chain().tiers(),
        vec![Tier::Memory, Tier::Distributed, Tier::Durable]
    );
}

#[tokio::test]
async fn test_miss_writes_through_every_tier() {
    let h = harness();
    h.origin.serve(SOURCE_URL, create_png(200, 100)).await;
    let key = derive_key(SOURCE_URL, OPTIONS);

    let response = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();

    assert_eq!(response.tier, None);
    assert_eq!(response.tier_label(), "miss");
    assert_eq!(response.content_type, "image/png");
    assert_eq!(dimensions(&response.data), (100, 50));

    assert!(h.memory.contains(&key).await);
    assert!(h.distributed.contains(&key).await);
    assert!(h.durable.contains(&key).await);
    assert_eq!(
        h.durable.content_type(&key).await.as_deref(),
        Some("image/png")
    );
}

#[tokio::test]
async fn test_durable_hit_is_promoted() {
    let h = harness();
    let key = derive_key(SOURCE_URL, OPTIONS);
    let stored = Bytes::from_static(b"durable bytes");
    h.durable.seed(&key, stored.clone()).await;

    let first = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();
    assert_eq!(first.tier, Some(Tier::Durable));
    assert_eq!(first.tier_label(), "durable");
    assert_eq!(first.data, stored);
    assert_eq!(first.content_type, "image/png");

    // Backfilled into both faster tiers before returning
    assert!(h.memory.contains(&key).await);
    assert!(h.distributed.contains(&key).await);

    let second = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();
    assert_eq!(second.tier, Some(Tier::Memory));
    assert_eq!(second.data, stored);

    assert_eq!(h.origin.fetch_count(), 0);
}

#[tokio::test]
async fn test_distributed_hit_skips_durable() {
    let h = harness();
    let key = derive_key(SOURCE_URL, OPTIONS);
    h.distributed
        .seed(&key, Bytes::from_static(b"distributed bytes"))
        .await;

    let response = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();

    assert_eq!(response.tier, Some(Tier::Distributed));
    assert!(h.memory.contains(&key).await);
    assert_eq!(h.durable.get_count(), 0);
    assert_eq!(h.durable.put_count(), 0);
    assert_eq!(h.origin.fetch_count(), 0);
}

#[tokio::test]
async fn test_memory_hit_touches_no_other_tier() {
    let h = harness();
    h.origin.serve(SOURCE_URL, create_png(200, 100)).await;

    h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();
    let distributed_reads = h.distributed.get_count();
    let durable_reads = h.durable.get_count();

    let response = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();

    assert_eq!(response.tier, Some(Tier::Memory));
    assert_eq!(h.distributed.get_count(), distributed_reads);
    assert_eq!(h.durable.get_count(), durable_reads);
}

// =============================================================================
// Cache Key Behavior
// =============================================================================

#[tokio::test]
async fn test_option_order_produces_separate_entries() {
    let h = harness();
    h.origin.serve(SOURCE_URL, create_png(200, 100)).await;

    let a = h
        .proxy
        .handle(SOURCE_URL, "width=100,format=png")
        .await
        .unwrap();
    let b = h
        .proxy
        .handle(SOURCE_URL, "format=png,width=100")
        .await
        .unwrap();

    assert_eq!(a.tier, None);
    assert_eq!(b.tier, None);
    assert_eq!(h.origin.fetch_count(), 2);
    assert_eq!(h.memory.len().await, 2);
}

#[tokio::test]
async fn test_different_sources_do_not_collide() {
    let h = harness();
    h.origin.serve(SOURCE_URL, create_png(200, 100)).await;
    h.origin
        .serve("https://example.com/other.png", create_png(100, 200))
        .await;

    let a = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();
    let b = h
        .proxy
        .handle("https://example.com/other.png", OPTIONS)
        .await
        .unwrap();

    assert_eq!(dimensions(&a.data), (100, 50));
    assert_eq!(dimensions(&b.data), (100, 200));
}

// =============================================================================
// Fail-Open Behavior
// =============================================================================

#[tokio::test]
async fn test_failing_tiers_degrade_to_miss() {
    let h = harness_with(
        MockTier::failing(Tier::Distributed),
        MockTier::failing(Tier::Durable),
        DEFAULT_TIER_TIMEOUT,
    );
    h.origin.serve(SOURCE_URL, create_png(200, 100)).await;
    let key = derive_key(SOURCE_URL, OPTIONS);

    let response = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();

    assert_eq!(response.tier, None);
    assert_eq!(h.origin.fetch_count(), 1);
    assert!(h.distributed.get_count() >= 1);
    assert!(h.durable.put_count() >= 1);

    // The healthy memory tier still got the write
    assert!(h.memory.contains(&key).await);
}

#[tokio::test]
async fn test_slow_tier_is_bounded_by_timeout() {
    let h = harness_with(
        MockTier::slow(Tier::Distributed, Duration::from_secs(5)),
        MockTier::new(Tier::Durable),
        Duration::from_millis(50),
    );
    h.origin.serve(SOURCE_URL, create_png(200, 100)).await;

    let start = std::time::Instant::now();
    let response = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap();

    assert_eq!(response.tier, None);
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_errors_leave_tiers_untouched() {
    let h = harness();
    h.origin.serve_status(SOURCE_URL, 404).await;

    let err = h.proxy.handle(SOURCE_URL, OPTIONS).await.unwrap_err();

    assert!(matches!(err, ProxyError::OriginUnavailable(_)));
    assert!(h.memory.is_empty().await);
    assert_eq!(h.distributed.len().await, 0);
    assert_eq!(h.durable.len().await, 0);
}

#[tokio::test]
async fn test_validation_error_skips_cache_and_origin() {
    let h = harness();

    let err = h.proxy.handle(SOURCE_URL, "fit=zoom").await.unwrap_err();

    assert!(matches!(err, ProxyError::InvalidFitMode(_)));
    assert_eq!(h.distributed.get_count(), 0);
    assert_eq!(h.durable.get_count(), 0);
    assert_eq!(h.origin.fetch_count(), 0);
}

// =============================================================================
// Concurrent Misses
// =============================================================================

async fn concurrent_requests(proxy: &ImageProxy<MockOrigin>, n: usize) {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let proxy = proxy.clone();
            tokio::spawn(async move { proxy.handle(SOURCE_URL, OPTIONS).await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(dimensions(&response.data), (100, 50));
    }
}

#[tokio::test]
async fn test_concurrent_misses_leave_consistent_cache() {
    let origin = MockOrigin::new().with_delay(Duration::from_millis(100));
    origin.serve(SOURCE_URL, create_png(200, 100)).await;
    let memory = Arc::new(MemoryCache::default());

    let proxy = ImageProxy::new(
        TierChain::new(DEFAULT_TIER_TIMEOUT).with_tier(memory.clone()),
        origin.clone(),
    );

    concurrent_requests(&proxy, 8).await;

    // Without coalescing every concurrent miss does its own fetch
    assert!(origin.fetch_count() > 1);
    assert_eq!(memory.len().await, 1);

    let key = derive_key(SOURCE_URL, OPTIONS);
    let stored = memory.lookup(&key).await.unwrap();
    assert_eq!(memory.size().await, stored.len());
}

#[tokio::test]
async fn test_coalescing_collapses_concurrent_misses() {
    let origin = MockOrigin::new().with_delay(Duration::from_millis(100));
    origin.serve(SOURCE_URL, create_png(200, 100)).await;
    let memory = Arc::new(MemoryCache::default());

    let proxy = ImageProxy::new(
        TierChain::new(DEFAULT_TIER_TIMEOUT).with_tier(memory.clone()),
        origin.clone(),
    )
    .with_coalescing(true);
    assert!(proxy.coalescing());

    concurrent_requests(&proxy, 8).await;

    assert_eq!(origin.fetch_count(), 1);
    assert_eq!(memory.len().await, 1);
}

#[tokio::test]
async fn test_coalescing_shares_errors() {
    let origin = MockOrigin::new().with_delay(Duration::from_millis(50));
    origin.serve_status(SOURCE_URL, 404).await;

    let proxy = ImageProxy::new(
        TierChain::new(DEFAULT_TIER_TIMEOUT).with_tier(Arc::new(MemoryCache::default())),
        origin.clone(),
    )
    .with_coalescing(true);

    let (a, b) = tokio::join!(
        proxy.handle(SOURCE_URL, OPTIONS),
        proxy.handle(SOURCE_URL, OPTIONS)
    );

    assert!(matches!(a, Err(ProxyError::OriginUnavailable(_))));
    assert!(matches!(b, Err(ProxyError::OriginUnavailable(_))));
    assert_eq!(origin.fetch_count(), 1);

    // A later request retries rather than replaying the failure
    let _ = proxy.handle(SOURCE_URL, OPTIONS).await;
    assert_eq!(origin.fetch_count(), 2);
}
