//! Fixed-window request rate limiting
//!
//! One window per client IP, applied uniformly to the API router. Windows
//! reset when their interval elapses; counts above the cap reject with
//! RATE_LIMIT_EXCEEDED.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use dashmap::DashMap;
use std::net::SocketAddr;

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};
use crate::server::state::AppState;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: i64,
    count: u32,
}

/// Fixed-window counter keyed by client address
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window_secs: i64,
}

impl RateLimiter {
    /// Create a limiter from configuration
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: config.max_requests,
            window_secs: config.window_secs,
        }
    }

    /// Count a request for `key`; returns false once the cap is exceeded
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Utc::now().timestamp())
    }

    fn check_at(&self, key: &str, now: i64) -> bool {
        let mut window = self.windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now - window.started_at >= self.window_secs {
            window.started_at = now;
            window.count = 0;
        }

        window.count += 1;
        window.count <= self.max_requests
    }
}

/// Axum middleware enforcing the request cap
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let key = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !state.rate_limiter().check(&key) {
        tracing::warn!("Rate limit exceeded for {}", key);
        return Err(Error::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: i64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs,
        })
    }

    #[test]
    fn test_allows_up_to_cap() {
        let limiter = limiter(3, 60);
        assert!(limiter.check_at("1.2.3.4", 1000));
        assert!(limiter.check_at("1.2.3.4", 1001));
        assert!(limiter.check_at("1.2.3.4", 1002));
        assert!(!limiter.check_at("1.2.3.4", 1003));
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1, 60);
        assert!(limiter.check_at("1.2.3.4", 1000));
        assert!(!limiter.check_at("1.2.3.4", 1030));
        // New window after the interval elapses
        assert!(limiter.check_at("1.2.3.4", 1060));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1, 60);
        assert!(limiter.check_at("1.2.3.4", 1000));
        assert!(limiter.check_at("5.6.7.8", 1000));
        assert!(!limiter.check_at("1.2.3.4", 1001));
    }
}
