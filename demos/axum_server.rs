//! Minimal service wiring: settings from the environment, JSON logs,
//! in-memory storage, and the rate limit layer in front of one route.
//!
//! Run with:
//!
//! ```sh
//! RATE_LIMIT_STRATEGY=sliding_window RATE_LIMIT_DEFAULT=5 \
//!     cargo run --example axum_server
//! ```

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tracing_subscriber::EnvFilter;

use sentinel_ratelimit::{
    Limiter, MemoryStore, QuotaResolver, Settings, TierTable, middleware::RateLimitLayer,
};

async fn root() -> &'static str {
    "request allowed\n"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(
        app = %settings.app_name,
        strategy = %settings.strategy,
        limit = settings.default_limit,
        window = settings.default_window,
        "starting"
    );

    let resolver =
        QuotaResolver::with_table(TierTable::default().with_free(settings.default_quota()));
    let limiter = Limiter::from_kind(settings.strategy);
    let storage = MemoryStore::new();

    let app = Router::new()
        .route("/", get(root))
        .layer(RateLimitLayer::new(storage, limiter, resolver));

    let addr: SocketAddr = "127.0.0.1:3000".parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
