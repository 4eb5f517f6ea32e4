use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::{net::SocketAddr, sync::Arc};
use tracing::warn;

use crate::{config::Config, parse::dtos::ParseResponse};

pub const RATE_LIMITED_MESSAGE: &str = "请求过于频繁，请稍后再试";

/// Fixed-window request counter per client.
#[derive(Clone)]
pub struct RateLimit {
    store: Arc<DashMap<String, RateLimitData>>,
    max_requests: u32,
    window_seconds: i64,
}

#[derive(Debug, Clone)]
struct RateLimitData {
    count: u32,
    window_start: DateTime<Utc>,
}

impl RateLimit {
    pub fn new(max_requests: u32, window_seconds: i64) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            max_requests,
            window_seconds,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_max_requests(),
            config.rate_limit_window_secs(),
        )
    }

    fn window(&self) -> Duration {
        Duration::seconds(self.window_seconds)
    }

    /// Counts one request from `client`. Over the limit, returns the seconds
    /// until its window resets.
    pub fn check(&self, client: &str, now: DateTime<Utc>) -> Result<(), i64> {
        let window = self.window();
        let mut entry = self
            .store
            .entry(client.to_string())
            .or_insert_with(|| RateLimitData {
                count: 0,
                window_start: now,
            });
        let data = entry.value_mut();

        if now.signed_duration_since(data.window_start) >= window {
            data.count = 0;
            data.window_start = now;
        }

        data.count += 1;

        if data.count > self.max_requests {
            let remaining = (data.window_start + window - now).num_seconds();
            return Err(remaining.max(1));
        }
        Ok(())
    }

    /// Drops clients whose window has passed; returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let window = self.window();
        let before = self.store.len();
        self.store
            .retain(|_, data| now.signed_duration_since(data.window_start) < window);
        before - self.store.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }
}

/// The caller's address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket.
pub fn client_key(req: &Request) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// IP-based rate limiting middleware.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimit>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);

    if let Err(retry_after) = rate_limit.check(&client, Utc::now()) {
        warn!(%client, retry_after, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(RETRY_AFTER, retry_after.to_string())],
            Json(ParseResponse::failure(RATE_LIMITED_MESSAGE)),
        )
            .into_response();
    }

    next.run(req).await
}
