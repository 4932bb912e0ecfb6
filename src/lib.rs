//! # img-proxy
//!
//! An on-demand image transformation proxy with multi-tier caching.
//!
//! A request names a source image URL and a compact option string such as
//! `width=800,format=webp,quality=80,fit=cover`. The proxy fetches the
//! source, resizes and re-encodes it, and caches the result in memory,
//! Redis and S3 so the work is done once.
//!
//! ## Features
//!
//! - **Four fit modes**: contain, cover, fill and centered crop
//! - **Output formats**: WebP (lossy), JPEG and PNG (alpha preserved)
//! - **Tiered caching**: in-process LRU → Redis (TTL) → S3, with promotion
//!   of hits into faster tiers
//! - **Fail-open storage**: cache tier failures and timeouts degrade to a miss
//! - **Optional request coalescing** for concurrent identical misses
//!
//! ## Architecture
//!
//! - [`transform`] - Option parsing, fit geometry and encoding
//! - [`cache`] - Cache keys, the three tiers and the tier chain
//! - [`io`] - Origin fetching and S3 client construction
//! - [`proxy`] - Request orchestration
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use img_proxy::{
//!     create_router, HttpOriginFetcher, ImageProxy, MemoryCache, RouterConfig, TierChain,
//!     DEFAULT_MAX_ORIGIN_BYTES, DEFAULT_TIER_TIMEOUT,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let chain = TierChain::new(DEFAULT_TIER_TIMEOUT)
//!         .with_tier(Arc::new(MemoryCache::default()));
//!     let fetcher = HttpOriginFetcher::new(DEFAULT_MAX_ORIGIN_BYTES).unwrap();
//!
//!     let router = create_router(ImageProxy::new(chain, fetcher), RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod io;
pub mod proxy;
pub mod server;
pub mod transform;

// Re-export commonly used types
pub use cache::{
    derive_key, CacheEntry, CacheKey, CacheTier, MemoryCache, RedisCache, S3Cache, Tier,
    TierChain, DEFAULT_TIER_TIMEOUT,
};
pub use config::{CheckConfig, Cli, Command, ServeConfig, StorageConfig};
pub use error::{CacheTierError, FetchError, OptionsError, ProxyError, TransformError};
pub use io::{
    create_s3_client, HttpOriginFetcher, OriginFetcher, OriginResponse, DEFAULT_MAX_ORIGIN_BYTES,
    DEFAULT_ORIGIN_TIMEOUT,
};
pub use proxy::{ImageProxy, InFlight, ProxyResponse};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use transform::{
    Dimension, FitMode, OutputFormat, TransformEngine, TransformOutput, TransformSpec,
};
