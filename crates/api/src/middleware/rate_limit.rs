//! Per-client rate limiting for the public registration endpoint.
//!
//! Each client address gets its own token bucket. The client is the peer
//! address of the connection. `X-Forwarded-For` is only consulted when the
//! peer is a configured trusted proxy, and then the nearest untrusted hop wins.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovRateLimiter,
};
use serde_json::json;
use std::{net::IpAddr, net::SocketAddr, num::NonZeroU32};

use crate::app::AppState;

type ClientRateLimiter = GovRateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Limiter keyed by client address.
pub struct RateLimiterState {
    limiter: ClientRateLimiter,
    trusted_proxies: Vec<IpAddr>,
    rate_limit_per_minute: u32,
}

impl RateLimiterState {
    /// Returns `None` when the limit is 0, which disables limiting.
    pub fn new(rate_limit_per_minute: u32, trusted_proxies: Vec<IpAddr>) -> Option<Self> {
        let per_minute = NonZeroU32::new(rate_limit_per_minute)?;
        Some(Self::with_quota(
            Quota::per_minute(per_minute),
            rate_limit_per_minute,
            trusted_proxies,
        ))
    }

    fn with_quota(quota: Quota, rate_limit_per_minute: u32, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            limiter: GovRateLimiter::keyed(quota),
            trusted_proxies,
            rate_limit_per_minute,
        }
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// `Err` carries the retry-after delay in whole seconds (at least 1).
    pub fn check(&self, client: &str) -> Result<(), u64> {
        self.limiter
            .check_key(&client.to_string())
            .map_err(|not_until| {
                not_until
                    .wait_time_from(DefaultClock::default().now())
                    .as_secs()
                    .max(1)
            })
    }

    /// Forgets clients whose bucket has fully refilled. Returns how many remain.
    pub fn evict_idle(&self) -> usize {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.limiter.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Address a request is charged to.
    pub fn client_key(&self, req: &Request<Body>) -> String {
        let Some(peer) = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
        else {
            return "unknown".to_string();
        };

        if !self.trusted_proxies.contains(&peer) {
            return peer.to_string();
        }

        req.headers()
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.rsplit(',')
                    .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
                    .find(|hop| !self.trusted_proxies.contains(hop))
            })
            .unwrap_or(peer)
            .to_string()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

/// Parses configured proxy addresses, skipping invalid entries.
pub fn parse_trusted_proxies(entries: &[String]) -> Vec<IpAddr> {
    entries
        .iter()
        .filter_map(|entry| match entry.trim().parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(proxy = %entry, "Ignoring invalid trusted proxy address");
                None
            }
        })
        .collect()
}

pub async fn registration_rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(rate_limiter) = state.rate_limiter.as_deref() {
        let client = rate_limiter.client_key(&req);
        if let Err(retry_after) = rate_limiter.check(&client) {
            tracing::warn!(client = %client, "Registration rate limit exceeded");
            metrics::counter!("registrations_rejected_total", "reason" => "rate_limited")
                .increment(1);
            return rate_limited_response(rate_limiter.rate_limit_per_minute(), retry_after);
        }
    }

    next.run(req).await
}

fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "retryAfter": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
