//! Tower layer and service implementing the request interceptor.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode},
};
use tower::{Layer, Service};
use tracing::{debug, error, info, warn};

use crate::decision::Decision;
use crate::headers;
use crate::identity;
use crate::quota::{QuotaResolver, UserTier};
use crate::storage::Storage;
use crate::strategy::{Limiter, Strategy};

/// Tower layer that rate limits every request passing through it.
///
/// The strategy and quota resolver are dependency-injected and shared
/// via read-only handles; construct the layer once at startup.
pub struct RateLimitLayer<S> {
    storage: Arc<S>,
    limiter: Option<Arc<Limiter>>,
    resolver: Option<Arc<QuotaResolver>>,
}

impl<S> RateLimitLayer<S> {
    /// Create a fully configured rate limit layer.
    pub fn new(storage: S, limiter: Limiter, resolver: QuotaResolver) -> Self {
        Self {
            storage: Arc::new(storage),
            limiter: Some(Arc::new(limiter)),
            resolver: Some(Arc::new(resolver)),
        }
    }

    /// Start building a layer whose parts may be filled in separately.
    ///
    /// A layer missing its strategy or resolver logs a warning per
    /// request and forwards unmodified rather than failing.
    pub fn builder(storage: S) -> RateLimitLayerBuilder<S> {
        RateLimitLayerBuilder {
            storage,
            limiter: None,
            resolver: None,
        }
    }
}

impl<S> Clone for RateLimitLayer<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            limiter: self.limiter.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

/// Builder for [`RateLimitLayer`].
pub struct RateLimitLayerBuilder<S> {
    storage: S,
    limiter: Option<Limiter>,
    resolver: Option<QuotaResolver>,
}

impl<S> RateLimitLayerBuilder<S> {
    /// Set the strategy.
    pub fn limiter(mut self, limiter: Limiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Set the quota resolver.
    pub fn resolver(mut self, resolver: QuotaResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Build the layer.
    pub fn build(self) -> RateLimitLayer<S> {
        RateLimitLayer {
            storage: Arc::new(self.storage),
            limiter: self.limiter.map(Arc::new),
            resolver: self.resolver.map(Arc::new),
        }
    }
}

impl<S, Inner> Layer<Inner> for RateLimitLayer<S> {
    type Service = RateLimitService<S, Inner>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RateLimitService {
            inner,
            storage: self.storage.clone(),
            limiter: self.limiter.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

/// The rate limiting service produced by [`RateLimitLayer`].
pub struct RateLimitService<S, Inner> {
    inner: Inner,
    storage: Arc<S>,
    limiter: Option<Arc<Limiter>>,
    resolver: Option<Arc<QuotaResolver>>,
}

impl<S, Inner: Clone> Clone for RateLimitService<S, Inner> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            storage: self.storage.clone(),
            limiter: self.limiter.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<S, Inner> Service<Request<Body>> for RateLimitService<S, Inner>
where
    S: Storage,
    Inner: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    Inner::Future: Send,
{
    type Response = Response<Body>;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let storage = self.storage.clone();
        let limiter = self.limiter.clone();
        let resolver = self.resolver.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (Some(limiter), Some(resolver)) = (limiter, resolver) else {
                warn!("rate limiter missing strategy or resolver, forwarding unmodified");
                return inner.call(request).await;
            };

            let client_id = classify(&request);
            let tier = resolver.tier(&client_id);
            let quota = resolver.resolve(&client_id);

            let decision = match limiter.check(&*storage, &client_id, &quota).await {
                Ok(decision) => decision,
                Err(error) if error.is_transport() => {
                    // Fail open: degraded storage must not deny traffic.
                    warn!(%client_id, %error, "storage transport failure, failing open");
                    return inner.call(request).await;
                }
                Err(error) => {
                    error!(%client_id, %error, "rate limit check failed, forwarding unmodified");
                    return inner.call(request).await;
                }
            };

            if decision.is_denied() {
                info!(
                    %client_id,
                    tier = tier.as_str(),
                    limit = decision.limit,
                    retry_after = decision.retry_after,
                    "rate limit exceeded"
                );
                return Ok(denial_response(&decision, tier));
            }

            debug!(
                %client_id,
                tier = tier.as_str(),
                remaining = decision.remaining,
                "request allowed"
            );

            let mut response = inner.call(request).await?;
            stamp_headers(&mut response, &decision, tier);
            Ok(response)
        })
    }
}

/// Build the client identity from the request, by precedence: API
/// credential, forwarded-for chain, transport peer address.
fn classify(request: &Request<Body>) -> String {
    let api_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());
    let forwarded_for = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    identity::client_id(api_key, forwarded_for, peer)
}

/// Stamp the decision's headers onto a response without touching its
/// status.
fn stamp_headers(response: &mut Response<Body>, decision: &Decision, tier: UserTier) {
    let headers = response.headers_mut();
    for (name, value) in decision.headers() {
        if let Ok(value) = value.parse() {
            headers.insert(name, value);
        }
    }
    if let Ok(value) = tier.as_str().parse() {
        headers.insert(headers::USER_TIER, value);
    }
}

/// Short-circuit 429 response for a denied decision.
fn denial_response(decision: &Decision, tier: UserTier) -> Response<Body> {
    let body = serde_json::json!({
        "error": "rate_limit_exceeded",
        "tier": tier.as_str(),
        "retry_after": decision.retry_after,
        "message": "Quota exceeded",
    });

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    stamp_headers(&mut response, decision, tier);

    let headers = response.headers_mut();
    if let Ok(value) = "application/json".parse() {
        headers.insert("content-type", value);
    }
    if let Ok(value) = decision.retry_after_secs().to_string().parse() {
        headers.insert(headers::RETRY_AFTER, value);
    }
    response
}
