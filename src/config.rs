//! Configuration management for the image proxy.
//!
//! This module provides:
//! - Command-line arguments via clap
//! - Environment variables with the `IMG_PROXY_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Subcommands
//!
//! - `serve`: run the HTTP server
//! - `check`: verify Redis and S3 connectivity for the same settings
//!
//! # Environment Variables
//!
//! - `IMG_PROXY_HOST` - Server bind address (default: 0.0.0.0)
//! - `IMG_PROXY_PORT` - Server port (default: 8000)
//! - `IMG_PROXY_MEMORY_ENTRIES` - Memory tier entry limit (default: 100)
//! - `IMG_PROXY_MEMORY_BYTES` - Memory tier byte budget (default: 100MB)
//! - `IMG_PROXY_REDIS_URL` - Redis URL; distributed tier disabled when unset
//! - `IMG_PROXY_REDIS_TTL` - Redis entry TTL in seconds (default: 86400)
//! - `IMG_PROXY_S3_BUCKET` - S3 bucket; durable tier disabled when unset
//! - `IMG_PROXY_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `IMG_PROXY_S3_REGION` - AWS region (default: ap-south-1)
//! - `IMG_PROXY_KEY_PREFIX` - Object key prefix (default: optimized/)
//! - `IMG_PROXY_TIER_TIMEOUT_MS` - Per-call cache tier deadline (default: 2000)
//! - `IMG_PROXY_ORIGIN_TIMEOUT` - Origin fetch deadline in seconds (default: 10)
//! - `IMG_PROXY_MAX_ORIGIN_BYTES` - Largest accepted source image (default: 20MB)
//! - `IMG_PROXY_MAX_DIMENSION` - Largest output width or height (default: 4096)
//! - `IMG_PROXY_COALESCE` - Coalesce concurrent identical misses (default: false)
//! - `IMG_PROXY_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 31536000)
//! - `IMG_PROXY_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::cache::{
    DEFAULT_KEY_PREFIX, DEFAULT_MEMORY_BYTES, DEFAULT_MEMORY_ENTRIES, DEFAULT_REDIS_TTL_SECS,
};
use crate::io::DEFAULT_MAX_ORIGIN_BYTES;
use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::transform::DEFAULT_MAX_DIMENSION;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "ap-south-1";

/// Default per-call cache tier deadline in milliseconds.
pub const DEFAULT_TIER_TIMEOUT_MS: u64 = 2000;

/// Default origin fetch deadline in seconds.
pub const DEFAULT_ORIGIN_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CLI
// =============================================================================

/// img-proxy - On-demand image transformation proxy.
///
/// Fetches source images, resizes and re-encodes them, and caches results in
/// memory, Redis and S3.
#[derive(Parser, Debug, Clone)]
#[command(name = "img-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Consume the CLI and return the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Check Redis and S3 connectivity.
    Check(CheckConfig),
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Settings for the networked cache tiers, shared by `serve` and `check`.
#[derive(Args, Debug, Clone)]
pub struct StorageConfig {
    /// Redis URL for the distributed tier (e.g. redis://127.0.0.1:6379).
    ///
    /// If not specified, the distributed tier is disabled.
    #[arg(long, env = "IMG_PROXY_REDIS_URL")]
    pub redis_url: Option<String>,

    /// TTL in seconds for every Redis entry.
    #[arg(long, default_value_t = DEFAULT_REDIS_TTL_SECS, env = "IMG_PROXY_REDIS_TTL")]
    pub redis_ttl: u64,

    /// S3 bucket for the durable tier.
    ///
    /// If not specified, the durable tier is disabled.
    #[arg(long, env = "IMG_PROXY_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "IMG_PROXY_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "IMG_PROXY_S3_REGION")]
    pub s3_region: String,

    /// Prefix for Redis keys and S3 object keys.
    #[arg(long, default_value = DEFAULT_KEY_PREFIX, env = "IMG_PROXY_KEY_PREFIX")]
    pub key_prefix: String,
}

impl StorageConfig {
    /// Validate the storage settings.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref redis_url) = self.redis_url {
            let parsed =
                Url::parse(redis_url).map_err(|e| format!("Invalid Redis URL: {}", e))?;
            if !matches!(parsed.scheme(), "redis" | "rediss" | "redis+unix" | "unix") {
                return Err(format!(
                    "Invalid Redis URL scheme '{}' (expected redis:// or rediss://)",
                    parsed.scheme()
                ));
            }
        }

        if self.redis_ttl == 0 {
            return Err("redis_ttl must be greater than 0".to_string());
        }

        if let Some(ref bucket) = self.s3_bucket {
            if bucket.trim().is_empty() {
                return Err("S3 bucket name must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// The S3 bucket, if the durable tier is enabled.
    pub fn bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }
}

// =============================================================================
// Serve Configuration
// =============================================================================

/// Configuration for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMG_PROXY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMG_PROXY_PORT")]
    pub port: u16,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of entries in the memory tier.
    #[arg(long, default_value_t = DEFAULT_MEMORY_ENTRIES, env = "IMG_PROXY_MEMORY_ENTRIES")]
    pub memory_entries: usize,

    /// Byte budget for the memory tier.
    #[arg(long, default_value_t = DEFAULT_MEMORY_BYTES, env = "IMG_PROXY_MEMORY_BYTES")]
    pub memory_bytes: usize,

    #[command(flatten)]
    pub storage: StorageConfig,

    /// Deadline for each cache tier call, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TIER_TIMEOUT_MS, env = "IMG_PROXY_TIER_TIMEOUT_MS")]
    pub tier_timeout_ms: u64,

    // =========================================================================
    // Origin Configuration
    // =========================================================================
    /// Deadline for fetching a source image, in seconds.
    #[arg(long, default_value_t = DEFAULT_ORIGIN_TIMEOUT_SECS, env = "IMG_PROXY_ORIGIN_TIMEOUT")]
    pub origin_timeout: u64,

    /// Largest accepted source image, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_ORIGIN_BYTES, env = "IMG_PROXY_MAX_ORIGIN_BYTES")]
    pub max_origin_bytes: usize,

    // =========================================================================
    // Transform Configuration
    // =========================================================================
    /// Largest output width or height a request may ask for, in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "IMG_PROXY_MAX_DIMENSION")]
    pub max_dimension: u32,

    /// Collapse concurrent identical cache misses into one fetch and transform.
    #[arg(long, default_value_t = false, env = "IMG_PROXY_COALESCE")]
    pub coalesce: bool,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "IMG_PROXY_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "IMG_PROXY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.memory_entries == 0 {
            return Err("memory_entries must be greater than 0".to_string());
        }
        if self.memory_bytes == 0 {
            return Err("memory_bytes must be greater than 0".to_string());
        }
        if self.tier_timeout_ms == 0 {
            return Err("tier_timeout_ms must be greater than 0".to_string());
        }
        if self.origin_timeout == 0 {
            return Err("origin_timeout must be greater than 0".to_string());
        }
        if self.max_origin_bytes == 0 {
            return Err("max_origin_bytes must be greater than 0".to_string());
        }
        if self.max_dimension == 0 {
            return Err("max_dimension must be greater than 0".to_string());
        }

        self.storage.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-call cache tier deadline.
    pub fn tier_timeout(&self) -> Duration {
        Duration::from_millis(self.tier_timeout_ms)
    }

    /// Origin fetch deadline.
    pub fn origin_timeout(&self) -> Duration {
        Duration::from_secs(self.origin_timeout)
    }
}

// =============================================================================
// Check Configuration
// =============================================================================

/// Configuration for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
