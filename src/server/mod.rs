//! HTTP server layer for the image proxy.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │             GET /image/{options}/{*image_url}                   │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (requests, error → HTTP) │  │ (router, CORS, tracing)     │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, image_handler, AppState, ErrorResponse, HealthResponse, ImagePathParams,
    CACHE_TIER_HEADER, DEFAULT_CACHE_MAX_AGE,
};
pub use routes::{create_router, RouterConfig};
