use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use url::Url;

use crate::error::FetchError;

/// Default origin request deadline: 10 seconds
pub const DEFAULT_ORIGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default ceiling on the size of a source image: 20MB
pub const DEFAULT_MAX_ORIGIN_BYTES: usize = 20 * 1024 * 1024;

/// Raw answer from an origin server.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body (empty for non-success statuses)
    pub body: Bytes,
}

impl OriginResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches source image bytes.
///
/// Implementations must apply `timeout` to the whole exchange and must not
/// retry.
#[async_trait]
pub trait OriginFetcher: Send + Sync + 'static {
    /// Fetch `url`, returning its status and body.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<OriginResponse, FetchError>;
}

/// Origin fetcher over HTTP(S).
#[derive(Clone)]
pub struct HttpOriginFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpOriginFetcher {
    /// Build a fetcher with its own connection pool.
    pub fn new(max_bytes: usize) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, max_bytes))
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    /// Largest body accepted, in bytes.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    async fn get(&self, url: Url, raw: &str) -> Result<OriginResponse, FetchError> {
        let network_error = |e: reqwest::Error| FetchError::Network {
            url: raw.to_string(),
            message: e.to_string(),
        };
        let too_large = || FetchError::TooLarge {
            url: raw.to_string(),
            limit: self.max_bytes,
        };

        let mut resp = self.client.get(url).send().await.map_err(network_error)?;
        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            return Ok(OriginResponse {
                status,
                body: Bytes::new(),
            });
        }

        if let Some(len) = resp.content_length() {
            if len > self.max_bytes as u64 {
                return Err(too_large());
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = resp.chunk().await.map_err(network_error)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(OriginResponse {
            status,
            body: body.freeze(),
        })
    }
}

#[async_trait]
impl OriginFetcher for HttpOriginFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<OriginResponse, FetchError> {
        let parsed = parse_source_url(url)?;

        match tokio::time::timeout(timeout, self.get(parsed, url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Parse an absolute `http` or `https` URL.
pub fn parse_source_url(url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
