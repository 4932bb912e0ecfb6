//! Durable tier backed by S3 or an S3-compatible store.
//!
//! Objects live at `<key_prefix><hex>.<ext>` and never expire. A lookup is a
//! `HEAD` followed by a `GET`, so a missing object costs one round trip and
//! no body transfer.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{CacheKey, CacheTier, Tier};
use crate::error::CacheTierError;

/// Cache-Control stored with every durable object.
pub const DURABLE_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Default object key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "optimized/";

/// S3-backed durable cache.
#[derive(Clone)]
pub struct S3Cache {
    client: Client,
    bucket: String,
    key_prefix: String,
}

impl S3Cache {
    /// Create a durable tier over `bucket`.
    pub fn new(client: Client, bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full object key for a cache key.
    pub fn object_key(&self, key: &CacheKey) -> String {
        key.object_key(&self.key_prefix)
    }

    /// Check whether an object exists.
    ///
    /// A not-found answer is `Ok(false)`; anything else the store reports is
    /// an error.
    pub async fn exists(&self, object_key: &str) -> Result<bool, CacheTierError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);

                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    Ok(false)
                } else {
                    Err(CacheTierError::S3(e.to_string()))
                }
            }
        }
    }

    /// Verify the bucket is reachable with the current credentials.
    pub async fn check_bucket(&self) -> Result<(), CacheTierError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| CacheTierError::S3(e.to_string()))
    }
}

#[async_trait]
impl CacheTier for S3Cache {
    fn tier(&self) -> Tier {
        Tier::Durable
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheTierError> {
        let object_key = self.object_key(key);

        if !self.exists(&object_key).await? {
            return Ok(None);
        }

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| CacheTierError::S3(e.to_string()))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| CacheTierError::Connection(e.to_string()))?
            .into_bytes();

        Ok(Some(data))
    }

    async fn put(
        &self,
        key: &CacheKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), CacheTierError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(data))
            .content_type(content_type)
            .cache_control(DURABLE_CACHE_CONTROL)
            .send()
            .await
            .map_err(|e| CacheTierError::S3(e.to_string()))?;

        Ok(())
    }
}
