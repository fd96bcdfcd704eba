//! Axum middleware for rate limiting.
//!
//! Provides a Tower-compatible layer that sits in front of every
//! downstream handler: it classifies the client, resolves its quota,
//! asks the configured strategy for a decision, and either forwards the
//! request with rate-limit headers stamped on the response or
//! short-circuits with a 429.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use sentinel_ratelimit::{
//!     middleware::RateLimitLayer,
//!     Limiter, MemoryStore, QuotaResolver, StrategyKind,
//! };
//!
//! let app = Router::new()
//!     .route("/api/data", get(handler))
//!     .layer(RateLimitLayer::new(
//!         MemoryStore::new(),
//!         Limiter::from_kind(StrategyKind::TokenBucket),
//!         QuotaResolver::new(),
//!     ));
//! ```

mod layer;

pub use layer::{RateLimitLayer, RateLimitLayerBuilder, RateLimitService};
