use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info};

use super::inflight::InFlight;
use crate::cache::{derive_key, CacheKey, Tier, TierChain};
use crate::error::{FetchError, ProxyError};
use crate::io::{OriginFetcher, DEFAULT_ORIGIN_TIMEOUT};
use crate::transform::{TransformEngine, TransformSpec};

// =============================================================================
// Proxy Response
// =============================================================================

/// Result of one proxied image request.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// Encoded image bytes
    pub data: Bytes,

    /// `image/<format>`
    pub content_type: String,

    /// Tier that served the request, or `None` when it was transformed fresh
    pub tier: Option<Tier>,
}

impl ProxyResponse {
    /// Value for the `X-Cache-Tier` header.
    pub fn tier_label(&self) -> &'static str {
        self.tier.map(|t| t.as_str()).unwrap_or("miss")
    }
}

// =============================================================================
// Image Proxy
// =============================================================================

/// Request orchestrator.
///
/// For each request:
/// 1. Parse the options into a [`TransformSpec`]
/// 2. Derive the [`CacheKey`]
/// 3. Probe the tier chain; return on any hit
/// 4. Fetch the source from its origin
/// 5. Transform on the blocking pool
/// 6. Write the result to every tier
///
/// Steps 4-6 run in a spawned task, so they complete even if the caller
/// goes away.
///
/// # Example
///
/// ```ignore
/// let chain = TierChain::new(DEFAULT_TIER_TIMEOUT)
///     .with_tier(Arc::new(MemoryCache::default()));
/// let proxy = ImageProxy::new(chain, HttpOriginFetcher::new(DEFAULT_MAX_ORIGIN_BYTES)?);
///
/// let response = proxy.handle("https://example.com/cat.jpg", "width=300").await?;
/// println!("{} bytes from {}", response.data.len(), response.tier_label());
/// ```
pub struct ImageProxy<F: OriginFetcher> {
    chain: Arc<TierChain>,
    fetcher: Arc<F>,
    engine: TransformEngine,
    origin_timeout: Duration,
    inflight: Option<Arc<InFlight<Result<Bytes, ProxyError>>>>,
}

impl<F: OriginFetcher> Clone for ImageProxy<F> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            fetcher: Arc::clone(&self.fetcher),
            engine: self.engine,
            origin_timeout: self.origin_timeout,
            inflight: self.inflight.clone(),
        }
    }
}

impl<F: OriginFetcher> ImageProxy<F> {
    /// Create a proxy over `chain` and `fetcher` with the default origin
    /// timeout and no request coalescing.
    pub fn new(chain: TierChain, fetcher: F) -> Self {
        Self {
            chain: Arc::new(chain),
            fetcher: Arc::new(fetcher),
            engine: TransformEngine::new(),
            origin_timeout: DEFAULT_ORIGIN_TIMEOUT,
            inflight: None,
        }
    }

    /// Set the origin fetch deadline.
    pub fn with_origin_timeout(mut self, timeout: Duration) -> Self {
        self.origin_timeout = timeout;
        self
    }

    /// Set the largest output dimension a request may ask for.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.engine = TransformEngine::with_max_dimension(max_dimension);
        self
    }

    /// Collapse concurrent identical misses into one fetch and transform.
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.inflight = enabled.then(|| Arc::new(InFlight::new()));
        self
    }

    /// Get the tier chain.
    pub fn chain(&self) -> &TierChain {
        &self.chain
    }

    /// Whether concurrent misses are coalesced.
    pub fn coalescing(&self) -> bool {
        self.inflight.is_some()
    }

    /// Serve `source_url` transformed by `raw_options`.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::Validation`] / [`ProxyError::InvalidFitMode`] for bad
    ///   options or an explicit dimension above the ceiling, before any
    ///   cache or origin access
    /// - [`ProxyError::OriginUnavailable`] if the source cannot be fetched
    /// - [`ProxyError::Decode`], [`ProxyError::Encode`],
    ///   [`ProxyError::InvalidCropBounds`] or [`ProxyError::OutputTooLarge`]
    ///   from the transform
    pub async fn handle(
        &self,
        source_url: &str,
        raw_options: &str,
    ) -> Result<ProxyResponse, ProxyError> {
        let spec = TransformSpec::parse(raw_options)?;
        spec.check_max_dimension(self.engine.max_dimension())?;
        let key = derive_key(source_url, raw_options);
        let content_type = spec.content_type();

        if let Some(entry) = self.chain.lookup(&key, &content_type).await {
            return Ok(ProxyResponse {
                data: entry.data,
                content_type,
                tier: Some(entry.tier),
            });
        }

        debug!(key = %key, url = %source_url, "Cache miss on every tier");

        let data = match &self.inflight {
            Some(inflight) => {
                let name = key.to_string();
                inflight
                    .run(&name, || {
                        self.spawn_miss(source_url.to_string(), spec, key, content_type.clone())
                    })
                    .await?
            }
            None => {
                self.spawn_miss(source_url.to_string(), spec, key, content_type.clone())
                    .await?
            }
        };

        Ok(ProxyResponse {
            data,
            content_type,
            tier: None,
        })
    }

    async fn spawn_miss(
        &self,
        source_url: String,
        spec: TransformSpec,
        key: CacheKey,
        content_type: String,
    ) -> Result<Bytes, ProxyError> {
        let this = self.clone();
        let task =
            tokio::spawn(async move { this.fill(&source_url, spec, &key, &content_type).await });

        task.await
            .map_err(|e| ProxyError::Internal(format!("miss task failed: {}", e)))?
    }

    async fn fill(
        &self,
        source_url: &str,
        spec: TransformSpec,
        key: &CacheKey,
        content_type: &str,
    ) -> Result<Bytes, ProxyError> {
        let start = Instant::now();
        let origin = self.fetcher.fetch(source_url, self.origin_timeout).await?;

        if !origin.is_success() {
            return Err(FetchError::Status {
                url: source_url.to_string(),
                status: origin.status,
            }
            .into());
        }

        info!(
            url = %source_url,
            bytes = origin.body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched source image"
        );

        let engine = self.engine;
        let body = origin.body;
        let output = tokio::task::spawn_blocking(move || engine.transform(&body, &spec))
            .await
            .map_err(|e| ProxyError::Internal(format!("transform task failed: {}", e)))??;

        debug!(
            key = %key,
            width = output.width,
            height = output.height,
            bytes = output.data.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Transformed image"
        );

        self.chain.store(key, &output.data, content_type).await;

        Ok(output.data)
    }
}
