//! Rate limiting middleware
//!
//! Authenticated requests are limited per tenant, keyed on the verified
//! [`AuthContext`], so this layer must sit inside `auth_middleware` on
//! `/api/v1`. Requests without an `AuthContext` are limited per client IP.
//! Limiters idle for longer than a full refill are evicted.

use crate::auth::AuthContext;
use crate::config::ApiConfig;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

type DirectRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>;

/// Tracked keys above which idle limiters are swept.
const SWEEP_THRESHOLD: usize = 4096;

/// Minimum gap between two sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Key for rate limiting.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    Ip(IpAddr),
    Tenant(Uuid),
}

struct TrackedLimiter {
    limiter: Arc<DirectRateLimiter>,
    /// Milliseconds since `RateLimitState::epoch`
    last_seen: AtomicU64,
}

/// State for rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<ApiConfig>,
    limiters: Arc<DashMap<RateLimitKey, TrackedLimiter>>,
    epoch: Instant,
    last_sweep: Arc<AtomicU64>,
    idle_ttl: Duration,
}

impl RateLimitState {
    pub fn new(config: Arc<ApiConfig>) -> Self {
        // A limiter untouched for a full refill is indistinguishable from a new one
        let slowest = config
            .rate_limit_unauthenticated
            .min(config.rate_limit_authenticated)
            .max(1);
        let refill_secs = u64::from(config.rate_limit_burst.max(1)) * 60 / u64::from(slowest);
        Self {
            config,
            limiters: Arc::new(DashMap::new()),
            epoch: Instant::now(),
            last_sweep: Arc::new(AtomicU64::new(0)),
            idle_ttl: Duration::from_secs(refill_secs.max(60)),
        }
    }

    fn limit_for(&self, key: &RateLimitKey) -> u32 {
        match key {
            RateLimitKey::Ip(_) => self.config.rate_limit_unauthenticated,
            RateLimitKey::Tenant(_) => self.config.rate_limit_authenticated,
        }
    }

    fn now_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn limiter(&self, key: &RateLimitKey) -> Arc<DirectRateLimiter> {
        let now = self.now_millis();
        let limiter = {
            let entry = self.limiters.entry(key.clone()).or_insert_with(|| {
                let per_minute = NonZeroU32::new(self.limit_for(key)).unwrap_or(NonZeroU32::MIN);
                let burst =
                    NonZeroU32::new(self.config.rate_limit_burst).unwrap_or(NonZeroU32::MIN);
                let quota = Quota::per_minute(per_minute).allow_burst(burst);
                TrackedLimiter {
                    limiter: Arc::new(RateLimiter::direct(quota)),
                    last_seen: AtomicU64::new(now),
                }
            });
            entry.last_seen.store(now, Ordering::Relaxed);
            entry.limiter.clone()
        };
        self.maybe_sweep(now);
        limiter
    }

    fn maybe_sweep(&self, now: u64) {
        if self.limiters.len() <= SWEEP_THRESHOLD {
            return;
        }
        let last = self.last_sweep.load(Ordering::Relaxed);
        let interval = SWEEP_INTERVAL.as_millis() as u64;
        if now.saturating_sub(last) < interval
            || self
                .last_sweep
                .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_err()
        {
            return;
        }
        self.evict_idle(now);
    }

    /// Drop limiters not used within the idle window ending at `now`.
    fn evict_idle(&self, now: u64) {
        let ttl = self.idle_ttl.as_millis() as u64;
        let before = self.limiters.len();
        self.limiters.retain(|_, tracked| {
            now.saturating_sub(tracked.last_seen.load(Ordering::Relaxed)) < ttl
        });
        tracing::debug!(
            evicted = before.saturating_sub(self.limiters.len()),
            "swept idle rate limiters"
        );
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.limiters.len()
    }
}

/// Rejection carrying the number of seconds until the quota refills.
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut response = ApiError::too_many_requests(Some(self.retry_after)).into_response();
        response.headers_mut().insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Client IP, preferring proxy headers over the socket address.
fn extract_client_ip(request: &Request, fallback: Option<SocketAddr>) -> IpAddr {
    let from_header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse().ok())
    };

    from_header("x-forwarded-for")
        .or_else(|| from_header("x-real-ip"))
        .or_else(|| fallback.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn rate_limit_key(request: &Request, addr: Option<SocketAddr>) -> RateLimitKey {
    match request.extensions().get::<AuthContext>() {
        Some(auth) => RateLimitKey::Tenant(auth.tenant_id),
        None => RateLimitKey::Ip(extract_client_ip(request, addr)),
    }
}

/// Rate limiting middleware. Returns 429 with `Retry-After` when exhausted.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let key = rate_limit_key(&request, connect_info.map(|ConnectInfo(addr)| addr));
    let limiter = state.limiter(&key);

    match limiter.check() {
        Ok(_) => {
            let limit = state.limit_for(&key);
            let mut response = next.run(request).await;
            response.headers_mut().insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from_str(&limit.to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("100")),
            );
            Ok(response)
        }
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                .as_secs()
                .max(1);
            tracing::warn!(?key, retry_after, "rate limit exceeded");
            Err(RateLimitError { retry_after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMethod;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use crm_core::Role;
    use tower::ServiceExt;

    /// Stands in for `auth_middleware`: trusts `x-test-tenant` as verified.
    async fn fake_auth(mut request: Request, next: Next) -> Response {
        let tenant = request
            .headers()
            .get("x-test-tenant")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok());
        if let Some(tenant_id) = tenant {
            request.extensions_mut().insert(AuthContext::new(
                "test".to_string(),
                tenant_id,
                Role::Admin,
                AuthMethod::Jwt,
            ));
        }
        next.run(request).await
    }

    fn app(config: ApiConfig) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn_with_state(
                RateLimitState::new(Arc::new(config)),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn(fake_auth))
    }

    fn request(verified: Option<Uuid>, claimed: Option<Uuid>) -> Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/ping");
        if let Some(tenant) = verified {
            builder = builder.header("x-test-tenant", tenant.to_string());
        }
        if let Some(tenant) = claimed {
            builder = builder.header("x-tenant-id", tenant.to_string());
        }
        builder.body(Body::empty()).expect("request should build")
    }

    #[tokio::test]
    async fn test_burst_is_enforced_per_tenant() {
        let app = app(ApiConfig {
            rate_limit_authenticated: 1,
            rate_limit_burst: 2,
            ..ApiConfig::default()
        });
        let tenant = Uuid::now_v7();

        for _ in 0..2 {
            let response = app.clone().oneshot(request(Some(tenant), None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-ratelimit-limit"], "1");
        }

        let response = app.clone().oneshot(request(Some(tenant), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));

        // A different tenant has its own bucket
        let response = app
            .oneshot(request(Some(Uuid::now_v7()), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_tenant_header_alone_does_not_select_tenant_quota() {
        let app = app(ApiConfig {
            rate_limit_unauthenticated: 1,
            rate_limit_authenticated: 1000,
            rate_limit_burst: 1,
            ..ApiConfig::default()
        });
        let victim = Uuid::now_v7();

        // Unverified callers share the per-IP bucket whatever tenant they name
        let response = app.clone().oneshot(request(None, Some(victim))).await.unwrap();
        assert_eq!(response.headers()["x-ratelimit-limit"], "1");
        let response = app.clone().oneshot(request(None, Some(victim))).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // The named tenant's own quota is untouched
        let response = app.oneshot(request(Some(victim), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "1000");
    }

    #[tokio::test]
    async fn test_disabled_rate_limit_passes_through() {
        let app = app(ApiConfig {
            rate_limit_enabled: false,
            rate_limit_unauthenticated: 1,
            rate_limit_burst: 1,
            ..ApiConfig::default()
        });

        for _ in 0..5 {
            let response = app.clone().oneshot(request(None, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[test]
    fn test_idle_limiters_are_evicted() {
        let state = RateLimitState::new(Arc::new(ApiConfig::default()));
        for i in 0..10u8 {
            state.limiter(&RateLimitKey::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i))));
        }
        assert_eq!(state.tracked_keys(), 10);

        let later = state.now_millis() + state.idle_ttl.as_millis() as u64;
        let active = RateLimitKey::Tenant(Uuid::now_v7());
        state.limiter(&active);
        if let Some(tracked) = state.limiters.get(&active) {
            tracked.last_seen.store(later, Ordering::Relaxed);
        }

        state.evict_idle(later);
        assert_eq!(state.tracked_keys(), 1);
        assert!(state.limiters.contains_key(&active));
    }

    #[test]
    fn test_recently_used_limiters_survive_a_sweep() {
        let state = RateLimitState::new(Arc::new(ApiConfig::default()));
        let key = RateLimitKey::Tenant(Uuid::now_v7());
        state.limiter(&key);
        state.evict_idle(state.now_millis());
        assert_eq!(state.tracked_keys(), 1);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let ip = extract_client_ip(&request, Some("127.0.0.1:80".parse().unwrap()));
        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
    }
}
