use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use crates::observability::SystemMetrics;
use tracing::warn;

use super::error_responses::AppError;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Expired windows are dropped so the map stays bounded by active clients.
        windows.retain(|_, w| now.duration_since(w.started_at) < self.window);

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Resolves the rate-limit key. Only one reverse proxy is trusted, so the last
/// `x-forwarded-for` hop is used; earlier entries are client-supplied.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|v| v.rsplit(',').map(str::trim).find(|hop| !hop.is_empty()))
        .or_else(|| header("x-real-ip"))
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    if !limiter.check(&ip) {
        warn!(client_ip = %ip, path = %request.uri().path(), "http: rate limit exceeded");
        return AppError::RateLimit("Too many requests, please try again later".to_string())
            .into_response();
    }
    next.run(request).await
}

pub async fn track_response_time(
    State(metrics): State<Arc<SystemMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    metrics.track_response_time(started.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn limiter_blocks_after_max_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(600));
        let now = Instant::now();

        assert!(limiter.check_at("1.2.3.4", now));
        assert!(limiter.check_at("1.2.3.4", now + Duration::from_secs(1)));
        assert!(!limiter.check_at("1.2.3.4", now + Duration::from_secs(2)));
        assert!(limiter.check_at("5.6.7.8", now + Duration::from_secs(2)));
    }

    #[test]
    fn limiter_resets_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let now = Instant::now();

        assert!(limiter.check_at("1.2.3.4", now));
        assert!(!limiter.check_at("1.2.3.4", now + Duration::from_secs(9)));
        assert!(limiter.check_at("1.2.3.4", now + Duration::from_secs(10)));
    }

    #[test]
    fn client_ip_uses_the_hop_added_by_the_proxy() {
        let mut headers = HeaderMap::new();
        let peer = Some(SocketAddr::from(([10, 0, 0, 1], 443)));
        assert_eq!(client_ip(&headers, peer), "10.0.0.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.2"));
        assert_eq!(client_ip(&headers, peer), "10.0.0.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" , "));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_ip(&headers, peer), "198.51.100.4");

        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn spoofed_forwarded_entries_share_one_limit() {
        let limiter = RateLimiter::new(1, Duration::from_secs(600));
        let peer = Some(SocketAddr::from(([10, 0, 0, 1], 443)));

        let allowed = (0..5)
            .filter(|i| {
                let mut headers = HeaderMap::new();
                let forwarded = format!("10.9.9.{i}, 198.51.100.7");
                headers.insert(
                    "x-forwarded-for",
                    HeaderValue::from_str(&forwarded).unwrap(),
                );
                limiter.check(&client_ip(&headers, peer))
            })
            .count();

        assert_eq!(allowed, 1);
    }
}
