use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

/// Sliding-window request limiter keyed by client address. Timestamps older
/// than the window are pruned on every check, so a client regains capacity
/// gradually rather than at a fixed boundary.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    hits: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut hits = self.hits.lock().expect("rate limiter lock poisoned");
        let entry = hits.entry(ip).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= self.window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() as u32 >= self.max_requests {
            return false;
        }
        entry.push_back(now);
        // Keep the map from growing without bound under churny client IPs.
        if hits.len() > 4096 {
            hits.retain(|_, q| {
                q.front()
                    .map(|t| now.duration_since(*t) < self.window)
                    .unwrap_or(false)
            });
        }
        true
    }
}

pub async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.limiter.check(addr.ip()) {
        warn!(client = %addr.ip(), "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "message": "Too many requests, please try again later." })),
        )
            .into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn allows_up_to_the_cap() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at(ip(1), now));
        assert!(limiter.check_at(ip(1), now));
        assert!(limiter.check_at(ip(1), now));
        assert!(!limiter.check_at(ip(1), now));
    }

    #[test]
    fn window_slides_rather_than_resets() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at(ip(2), start));
        assert!(limiter.check_at(ip(2), start + Duration::from_secs(30)));
        assert!(!limiter.check_at(ip(2), start + Duration::from_secs(45)));
        // The first hit ages out at +60s; the one from +30s still counts.
        assert!(limiter.check_at(ip(2), start + Duration::from_secs(61)));
        assert!(!limiter.check_at(ip(2), start + Duration::from_secs(62)));
    }

    #[test]
    fn clients_are_limited_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at(ip(3), now));
        assert!(!limiter.check_at(ip(3), now));
        assert!(limiter.check_at(ip(4), now));
    }
}
