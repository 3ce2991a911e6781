//! Per-client sliding window rate limiting.
//!
//! Every client address gets a queue of the instants at which its recent requests arrived. A
//! request is admitted when fewer than `max_requests` instants fall inside the trailing `window`;
//! otherwise it is rejected with 429 and a `Retry-After` hint computed from the oldest instant.
//!
//! The number of tracked addresses is capped by `max_tracked_ips`. Idle queues are purged every
//! [`CLEANUP_INTERVAL`] requests, and on demand when the cap is hit.

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::errors::Error;

/// Run a purge of idle clients every this many checks
pub const CLEANUP_INTERVAL: u64 = 1000;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    max_tracked_ips: usize,
    hits: DashMap<IpAddr, VecDeque<Instant>>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests as usize,
            window: config.window,
            max_tracked_ips: config.max_tracked_ips,
            hits: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Record a request from `ip` at `now`.
    ///
    /// Returns `Err(retry_after)` when the client is over its budget; rejected requests are not
    /// recorded.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let count = self.checks.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % CLEANUP_INTERVAL == 0 {
            debug!(checks = count, "running periodic rate limiter cleanup");
            self.purge_stale(now);
        }

        if !self.hits.contains_key(&ip) && self.hits.len() >= self.max_tracked_ips {
            self.purge_stale(now);
            if self.hits.len() >= self.max_tracked_ips {
                warn!(ip = %ip, tracked = self.hits.len(), "rate limiter tracking capacity reached");
                return Err(self.window);
            }
        }

        let mut queue = self.hits.entry(ip).or_default();
        while let Some(oldest) = queue.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                queue.pop_front();
            } else {
                break;
            }
        }

        if queue.len() >= self.max_requests {
            let retry_after = queue
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            warn!(ip = %ip, requests = queue.len(), max = self.max_requests, "rate limit exceeded");
            return Err(retry_after);
        }

        queue.push_back(now);
        Ok(())
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    /// Drop every client whose most recent request has left the window.
    pub fn purge_stale(&self, now: Instant) {
        let window = self.window;
        self.hits
            .retain(|_, queue| queue.back().is_some_and(|last| now.saturating_duration_since(*last) < window));
    }

    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
fn client_ip(req: &Request) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }

    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    req.headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<IpAddr>().ok())
}

pub async fn rate_limit_middleware(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    // Requests with no attributable address are let through
    if let Some(ip) = client_ip(&req)
        && let Err(retry_after) = limiter.check(ip)
    {
        return Error::TooManyRequests {
            retry_after_secs: retry_after.as_secs().max(1),
        }
        .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64, max_tracked_ips: usize) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            max_requests,
            window: Duration::from_secs(window_secs),
            max_tracked_ips,
        })
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = limiter(3, 60, 100);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at(ip, now).is_ok());
        }
        let retry = limiter.check_at(ip, now).unwrap_err();
        assert_eq!(retry, Duration::from_secs(60));
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2, 10, 100);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(limiter.check_at(ip, start).is_ok());
        assert!(limiter.check_at(ip, start + Duration::from_secs(4)).is_ok());
        assert!(limiter.check_at(ip, start + Duration::from_secs(6)).is_err());

        // First request has left the window, one slot frees up
        assert!(limiter.check_at(ip, start + Duration::from_secs(10)).is_ok());
        let retry = limiter.check_at(ip, start + Duration::from_secs(11)).unwrap_err();
        assert_eq!(retry, Duration::from_secs(3));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1, 60, 100);
        let now = Instant::now();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check_at(a, now).is_ok());
        assert!(limiter.check_at(a, now).is_err());
        assert!(limiter.check_at(b, now).is_ok());
    }

    #[test]
    fn test_tracking_cap_and_purge() {
        let limiter = limiter(5, 10, 2);
        let start = Instant::now();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        let c: IpAddr = "10.0.0.3".parse().unwrap();

        assert!(limiter.check_at(a, start).is_ok());
        assert!(limiter.check_at(b, start).is_ok());
        // At capacity with both clients still inside the window
        assert!(limiter.check_at(c, start + Duration::from_secs(1)).is_err());

        // Once the others go idle the newcomer gets a slot
        assert!(limiter.check_at(c, start + Duration::from_secs(20)).is_ok());
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
