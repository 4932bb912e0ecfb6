//! Request orchestration.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         ImageProxy                          │
//! │                                                             │
//! │  parse options ─▶ derive key ─▶ TierChain::lookup ──▶ hit   │
//! │                                        │                    │
//! │                                        ▼ miss               │
//! │                     ┌─────────── spawned task ───────────┐  │
//! │                     │ OriginFetcher ─▶ TransformEngine   │  │
//! │                     │              ─▶ TierChain::store   │  │
//! │                     └────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Without coalescing, concurrent identical misses each fetch and transform
//! independently and the last write wins. [`ImageProxy::with_coalescing`]
//! routes misses through an [`InFlight`] registry instead.

mod inflight;
mod service;

pub use inflight::InFlight;
pub use service::{ImageProxy, ProxyResponse};
