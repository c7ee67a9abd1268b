//! Request handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::ratelimit::{LimiterStats, RateLimiter};

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
}

/// Liveness probe.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "pong".to_string(),
    })
}

/// Current limiter statistics.
pub async fn stats(State(rate_limiter): State<Arc<RateLimiter>>) -> Json<LimiterStats> {
    Json(rate_limiter.stats())
}
