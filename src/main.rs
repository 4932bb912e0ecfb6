//! img-proxy - On-demand image transformation proxy.
//!
//! This binary builds the cache tiers, origin fetcher and router, then
//! starts the HTTP server.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use img_proxy::{
    cache::{MemoryCache, RedisCache, S3Cache, TierChain},
    config::{CheckConfig, Cli, Command, ServeConfig, StorageConfig},
    io::{create_s3_client, HttpOriginFetcher},
    proxy::ImageProxy,
    server::{create_router, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("img-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!(
        "  Memory tier: {} entries, {}MB",
        config.memory_entries,
        config.memory_bytes / (1024 * 1024)
    );
    info!("  Tier timeout: {}ms", config.tier_timeout_ms);
    info!(
        "  Origin: {}s timeout, {}MB max",
        config.origin_timeout,
        config.max_origin_bytes / (1024 * 1024)
    );
    info!("  Max output dimension: {}px", config.max_dimension);
    if config.coalesce {
        info!("  Coalescing: enabled");
    }

    let chain = build_tier_chain(&config).await;

    let fetcher = match HttpOriginFetcher::new(config.max_origin_bytes) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let proxy = ImageProxy::new(chain, fetcher)
        .with_origin_timeout(config.origin_timeout())
        .with_max_dimension(config.max_dimension)
        .with_coalescing(config.coalesce);

    let router = create_router(proxy, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl -o out.webp 'http://{}/image/width=800,format=webp/https://example.com/photo.jpg'",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build the tier chain. Networked tiers that are not configured, or that
/// cannot be reached at startup, are left out.
async fn build_tier_chain(config: &ServeConfig) -> TierChain {
    let storage = &config.storage;

    let mut chain = TierChain::new(config.tier_timeout()).with_tier(Arc::new(MemoryCache::new(
        config.memory_entries,
        config.memory_bytes,
    )));

    match storage.redis_url.as_deref() {
        Some(url) => {
            let connect = RedisCache::connect(url, storage.key_prefix.as_str(), storage.redis_ttl);
            match tokio::time::timeout(config.tier_timeout(), connect).await {
                Ok(Ok(redis)) => {
                    info!("  Redis tier: enabled (ttl {}s)", storage.redis_ttl);
                    chain = chain.with_tier(Arc::new(redis));
                }
                Ok(Err(e)) => {
                    warn!("  Redis tier: unavailable, continuing without it ({})", e);
                }
                Err(_) => {
                    warn!(
                        "  Redis tier: connect timed out after {}ms, continuing without it",
                        config.tier_timeout_ms
                    );
                }
            }
        }
        None => info!("  Redis tier: disabled"),
    }

    match storage.bucket() {
        Some(bucket) => {
            let client =
                create_s3_client(storage.s3_endpoint.as_deref(), &storage.s3_region).await;
            info!(
                "  S3 tier: s3://{}/{} ({})",
                bucket, storage.key_prefix, storage.s3_region
            );
            if let Some(ref endpoint) = storage.s3_endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            chain = chain.with_tier(Arc::new(S3Cache::new(
                client,
                bucket,
                storage.key_prefix.as_str(),
            )));
        }
        None => info!("  S3 tier: disabled"),
    }

    chain
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "img_proxy=debug,tower_http=debug"
    } else {
        "img_proxy=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("img-proxy Configuration Check");
    println!("═════════════════════════════");
    println!();

    let storage = &config.storage;

    if let Err(e) = storage.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let mut ok = check_redis(storage).await;
    println!();
    ok &= check_s3(storage).await;

    println!();
    println!("═════════════════════════════");
    if ok {
        println!("✓ All checks passed!");
        ExitCode::SUCCESS
    } else {
        println!("✗ Some checks failed");
        ExitCode::FAILURE
    }
}

async fn check_redis(storage: &StorageConfig) -> bool {
    let Some(ref url) = storage.redis_url else {
        println!("- Redis: not configured (tier disabled)");
        return true;
    };

    println!("✓ Redis URL: {}", url);
    print!("Testing Redis connection... ");

    let result = match RedisCache::connect(url, storage.key_prefix.as_str(), storage.redis_ttl).await
    {
        Ok(redis) => redis.ping().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            println!("✓ success");
            true
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The Redis server is running and reachable");
            println!("  - The URL, password and database number are correct");
            false
        }
    }
}

async fn check_s3(storage: &StorageConfig) -> bool {
    let Some(bucket) = storage.bucket() else {
        println!("- S3: not configured (tier disabled)");
        return true;
    };

    println!("✓ Bucket: {}", bucket);
    if let Some(ref endpoint) = storage.s3_endpoint {
        println!("✓ Endpoint: {}", endpoint);
    }
    println!("✓ Region: {}", storage.s3_region);
    println!("✓ Key prefix: {}", storage.key_prefix);
    print!("Testing S3 connection... ");

    let client = create_s3_client(storage.s3_endpoint.as_deref(), &storage.s3_region).await;
    let s3 = S3Cache::new(client, bucket, storage.key_prefix.as_str());

    match s3.check_bucket().await {
        Ok(()) => {
            println!("✓ success");
            true
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - Your AWS credentials are configured correctly");
            println!("  - The bucket '{}' exists and is accessible", bucket);
            if storage.s3_endpoint.is_some() {
                println!("  - The S3 endpoint is correct and reachable");
            }
            false
        }
    }
}
