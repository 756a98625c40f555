use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Both limiters share the original 15-minute window.
pub const WINDOW: Duration = Duration::from_secs(15 * 60);

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client IP. Over-limit requests get
/// a 429 with a fixed textual message and no retry-after payload.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    window: Duration,
    max: u32,
    message: &'static str,
    hits: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32, message: &'static str) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                window,
                max,
                message,
                hits: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Count one hit for this caller; returns whether it is still allowed.
    pub fn check(&self, ip: IpAddr) -> bool {
        let mut hits = self
            .inner
            .hits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        let entry = hits.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.inner.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        entry.count <= self.inner.max
    }

    pub fn message(&self) -> &'static str {
        self.inner.message
    }
}

pub async fn enforce(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if limiter.check(ip) {
        next.run(req).await
    } else {
        (StatusCode::TOO_MANY_REQUESTS, limiter.message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const IP_B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn allows_up_to_the_cap_then_blocks() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3, "slow down");
        assert!(limiter.check(IP_A));
        assert!(limiter.check(IP_A));
        assert!(limiter.check(IP_A));
        assert!(!limiter.check(IP_A));
    }

    #[test]
    fn callers_are_counted_independently() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1, "slow down");
        assert!(limiter.check(IP_A));
        assert!(!limiter.check(IP_A));
        assert!(limiter.check(IP_B));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new(Duration::from_millis(10), 1, "slow down");
        assert!(limiter.check(IP_A));
        assert!(!limiter.check(IP_A));
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.check(IP_A));
    }
}
