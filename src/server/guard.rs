//! Client access control for proxied and statistics routes.
//!
//! Two independent checks: a client key (header `X-API-Key` or query
//! parameter `api_key`) when keys are configured, and a per-client
//! fixed-window rate limit backed by DashMap.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::state::AppState;
use crate::error::ProxyError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_PARAM: &str = "api_key";

/// Per-client fixed-window rate limiter.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    /// Counters per client: (request_count, window_start)
    counters: Arc<DashMap<String, (u32, Instant)>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            limit: requests_per_minute,
            window: Duration::from_secs(60),
        }
    }

    /// Count a request from `client`; `false` once over the limit.
    fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.counters.entry(client.to_string()).or_insert((0, now));

        if entry.1.elapsed() >= self.window {
            entry.0 = 0;
            entry.1 = now;
        }

        entry.0 += 1;
        entry.0 <= self.limit
    }

    /// Drop counters whose window has passed.
    pub fn cleanup(&self) {
        self.counters
            .retain(|_, (_, window_start)| window_start.elapsed() < self.window);
    }
}

/// Accepted client keys plus the optional rate limiter.
#[derive(Clone, Debug, Default)]
pub struct AccessGuard {
    keys: Arc<HashSet<String>>,
    limiter: Option<RateLimiter>,
}

impl AccessGuard {
    pub fn new(keys: &[String], rate_limit_rpm: u32) -> Self {
        Self {
            keys: Arc::new(keys.iter().cloned().collect()),
            limiter: (rate_limit_rpm > 0).then(|| RateLimiter::new(rate_limit_rpm)),
        }
    }

    pub fn requires_key(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    /// Validate the presented key. Open access when no keys are configured.
    fn authorize(&self, presented: Option<&str>) -> Result<(), ProxyError> {
        if !self.requires_key() {
            return Ok(());
        }
        match presented {
            None => Err(ProxyError::Unauthorized(
                "Missing API key. Use the 'X-API-Key' header or the 'api_key' parameter"
                    .to_string(),
            )),
            Some(key) if self.keys.contains(key) => Ok(()),
            Some(_) => Err(ProxyError::Unauthorized("Invalid API key".to_string())),
        }
    }

    /// Rate-limit bucket for an authorized request. A presented key names the
    /// bucket only when keys are configured.
    fn bucket(&self, presented: Option<String>, ip: impl FnOnce() -> String) -> String {
        match presented {
            Some(key) if self.requires_key() => key,
            _ => ip(),
        }
    }
}

/// Client key from the header, else from the query string.
fn presented_key(req: &Request) -> Option<String> {
    if let Some(value) = req.headers().get(API_KEY_HEADER)
        && let Ok(key) = value.to_str()
        && !key.trim().is_empty()
    {
        return Some(key.trim().to_string());
    }

    req.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, value)| name == API_KEY_PARAM && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_string())
    })
}

/// Extract client IP from X-Forwarded-For header or fall back to a default.
fn client_ip(req: &Request) -> String {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
    {
        let ip = first_ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }

    "unknown".to_string()
}

/// Axum middleware: reject unknown clients, then clients over their rate.
pub async fn guard_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = presented_key(&req);

    if let Err(e) = state.guard.authorize(key.as_deref()) {
        warn!("Rejected {} {}: {}", req.method(), req.uri().path(), e);
        return e.into_response();
    }

    if let Some(limiter) = state.guard.limiter() {
        let client = state.guard.bucket(key, || client_ip(&req));
        if !limiter.check(&client) {
            warn!("Rate limit exceeded for client: {}", client);
            return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded\n").into_response();
        }
        debug!("Rate limit ok for client: {}", client);
    }

    next.run(req).await
}
