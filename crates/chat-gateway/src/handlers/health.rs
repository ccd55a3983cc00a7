//! Health check handler.
//!
//! Liveness only: the gateway has no dependency worth pinging per check. The
//! key set fetch and agent calls are reported through metrics instead.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::instrument;

/// Name reported by `/health`.
pub const SERVICE_NAME: &str = "chat-gateway";

/// Health check handler.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": "2024-01-01T00:00:00.000Z",
///   "service": "chat-gateway",
///   "version": "0.1.0",
///   "region": "us-east-1"
/// }
/// ```
///
/// Responses are never cacheable.
#[instrument(skip_all, name = "gateway.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        region: state.config.region.clone(),
    };

    (
        [
            (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (PRAGMA, "no-cache"),
            (EXPIRES, "0"),
        ],
        Json(response),
    )
}
