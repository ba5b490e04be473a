//! Request limits per client address.
//!
//! Every client gets a fixed window per tier. The first request opens the
//! window, each request uses one slot, and the window is replaced once it has
//! run its full length. Login and registration share the smaller auth budget.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ApiError;
use crate::config::RateLimitConfig;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Everything behind a session
    Api,
    /// Login, registration and public code checks
    Auth,
}

impl RateLimitTier {
    fn limit(self, config: &RateLimitConfig) -> u32 {
        match self {
            RateLimitTier::Api => config.api_requests_per_window,
            RateLimitTier::Auth => config.auth_requests_per_window,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RateLimitTier::Api => "api",
            RateLimitTier::Auth => "auth",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    used: u32,
}

/// Outcome of counting one request against a client's window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed {
        limit: u32,
        remaining: u32,
        resets_in: Duration,
    },
    Throttled {
        limit: u32,
        retry_in: Duration,
    },
}

#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<(IpAddr, RateLimitTier), Window>,
    config: RateLimitConfig,
    span: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let span = Duration::from_secs(config.window_seconds.max(1));
        Self {
            windows: DashMap::new(),
            config,
            span,
        }
    }

    /// Count a request from `client` against `tier`
    pub fn admit(&self, client: IpAddr, tier: RateLimitTier) -> Verdict {
        self.admit_at(client, tier, Instant::now())
    }

    fn admit_at(&self, client: IpAddr, tier: RateLimitTier, now: Instant) -> Verdict {
        let limit = tier.limit(&self.config);
        if !self.config.enabled {
            return Verdict::Allowed {
                limit,
                remaining: limit,
                resets_in: Duration::ZERO,
            };
        }

        let mut window = self.windows.entry((client, tier)).or_insert(Window {
            opened: now,
            used: 0,
        });
        if now.saturating_duration_since(window.opened) >= self.span {
            *window = Window {
                opened: now,
                used: 0,
            };
        }

        let resets_in = self
            .span
            .saturating_sub(now.saturating_duration_since(window.opened));
        if window.used >= limit {
            return Verdict::Throttled {
                limit,
                retry_in: resets_in,
            };
        }
        window.used += 1;
        Verdict::Allowed {
            limit,
            remaining: limit - window.used,
            resets_in,
        }
    }

    /// Drop windows that have run out. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.saturating_duration_since(window.opened) < self.span);
        before.saturating_sub(self.windows.len())
    }

    /// Number of open windows
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Seconds for a header, rounded up so clients never retry early
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    // X-Forwarded-For lists the original client first
    value.split(',').next()?.trim().parse().ok()
}

/// Address a request is counted against: proxy headers, then the peer socket
fn client_addr(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    header_ip(headers, "x-forwarded-for")
        .or_else(|| header_ip(headers, "x-real-ip"))
        .or(peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, RateLimitTier::Api, request, next).await
}

pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, RateLimitTier::Auth, request, next).await
}

async fn enforce(
    state: &AppState,
    tier: RateLimitTier,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_addr(request.headers(), peer);

    match state.rate_limiter.admit(client, tier) {
        Verdict::Allowed {
            limit,
            remaining,
            resets_in,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(whole_seconds(resets_in)));
            Ok(response)
        }
        Verdict::Throttled { limit, retry_in } => {
            let wait = whole_seconds(retry_in).max(1);
            tracing::warn!(client = %client, tier = tier.as_str(), wait, "Request throttled");

            let mut response = ApiError::rate_limited(format!(
                "Too many requests. Try again in {} seconds.",
                wait
            ))
            .into_response();
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(wait));
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
            headers.insert("x-ratelimit-reset", HeaderValue::from(wait));
            Err(response)
        }
    }
}

/// Periodically drop finished windows so idle clients do not accumulate
pub fn spawn_cleanup_task(limiter: Arc<RateLimiter>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                tracing::debug!(removed, open = limiter.tracked(), "Rate limit windows swept");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use crate::db::init_in_memory;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn limits(api: u32, auth: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            api_requests_per_window: api,
            auth_requests_per_window: auth,
            window_seconds: 60,
            cleanup_interval: 300,
        }
    }

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_window_counts_down_then_throttles() {
        let limiter = RateLimiter::new(limits(3, 1));
        let start = Instant::now();
        let client = addr("203.0.113.10");

        let remaining: Vec<u32> = (0..3)
            .map(|_| match limiter.admit_at(client, RateLimitTier::Api, start) {
                Verdict::Allowed { remaining, .. } => remaining,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let later = start + Duration::from_secs(45);
        assert_eq!(
            limiter.admit_at(client, RateLimitTier::Api, later),
            Verdict::Throttled {
                limit: 3,
                retry_in: Duration::from_secs(15),
            }
        );
    }

    #[test]
    fn test_window_reopens_after_full_span() {
        let limiter = RateLimiter::new(limits(1, 1));
        let start = Instant::now();
        let client = addr("203.0.113.10");

        assert!(matches!(
            limiter.admit_at(client, RateLimitTier::Api, start),
            Verdict::Allowed { .. }
        ));
        assert!(matches!(
            limiter.admit_at(client, RateLimitTier::Api, start + Duration::from_secs(59)),
            Verdict::Throttled { .. }
        ));
        assert_eq!(
            limiter.admit_at(client, RateLimitTier::Api, start + Duration::from_secs(60)),
            Verdict::Allowed {
                limit: 1,
                remaining: 0,
                resets_in: Duration::from_secs(60),
            }
        );
    }

    #[test]
    fn test_clients_and_tiers_are_counted_apart() {
        let limiter = RateLimiter::new(limits(5, 1));
        let now = Instant::now();
        let ana = addr("198.51.100.1");
        let ben = addr("2001:db8::2");

        assert!(matches!(
            limiter.admit_at(ana, RateLimitTier::Auth, now),
            Verdict::Allowed { .. }
        ));
        assert!(matches!(
            limiter.admit_at(ana, RateLimitTier::Auth, now),
            Verdict::Throttled { limit: 1, .. }
        ));
        assert!(matches!(
            limiter.admit_at(ana, RateLimitTier::Api, now),
            Verdict::Allowed { limit: 5, remaining: 4, .. }
        ));
        assert!(matches!(
            limiter.admit_at(ben, RateLimitTier::Auth, now),
            Verdict::Allowed { .. }
        ));
        assert_eq!(limiter.tracked(), 3);
    }

    #[test]
    fn test_disabled_limiter_tracks_nothing() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..limits(1, 1)
        });
        for _ in 0..50 {
            assert!(matches!(
                limiter.admit(addr("192.0.2.1"), RateLimitTier::Auth),
                Verdict::Allowed { .. }
            ));
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_sweep_drops_only_finished_windows() {
        let limiter = RateLimiter::new(limits(5, 5));
        let start = Instant::now();
        limiter.admit_at(addr("192.0.2.1"), RateLimitTier::Api, start);
        limiter.admit_at(addr("192.0.2.2"), RateLimitTier::Api, start + Duration::from_secs(30));

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(59)), 0);
        assert_eq!(limiter.sweep_at(start + Duration::from_secs(60)), 1);
        assert_eq!(limiter.tracked(), 1);
        assert_eq!(limiter.sweep_at(start + Duration::from_secs(90)), 1);
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::ZERO), 0);
        assert_eq!(whole_seconds(Duration::from_secs(4)), 4);
        assert_eq!(whole_seconds(Duration::from_millis(4_001)), 5);
    }

    #[test]
    fn test_client_addr_precedence() {
        let peer: SocketAddr = "198.51.100.4:51000".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.8"));
        assert_eq!(client_addr(&headers, Some(peer)), addr("203.0.113.7"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(client_addr(&headers, Some(peer)), addr("203.0.113.8"));

        assert_eq!(client_addr(&HeaderMap::new(), Some(peer)), addr("198.51.100.4"));
        assert_eq!(
            client_addr(&HeaderMap::new(), None),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
    }

    #[tokio::test]
    async fn test_throttled_response_uses_error_envelope() {
        let db = init_in_memory().await.unwrap();
        let mut config = Config::default();
        config.rate_limit = limits(10, 2);
        let state = Arc::new(AppState::new(config, db));
        let app = Router::new()
            .route("/login", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_auth))
            .with_state(state);

        let call = |ip: &'static str| {
            Request::builder()
                .uri("/login")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        for expected in ["1", "0"] {
            let response = app.clone().oneshot(call("203.0.113.20")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-ratelimit-remaining"], expected);
        }

        let response = app.clone().oneshot(call("203.0.113.20")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "60");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], ErrorCode::TooManyRequests.as_str());

        let response = app.oneshot(call("203.0.113.21")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
