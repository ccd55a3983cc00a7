//! `POST /authorize`: the token authorizer exposed over HTTP.
//!
//! Accepts the authorizer request record as JSON and answers with the
//! allow policy. Any failure, including a body that does not parse, is the
//! same opaque 401.

use crate::auth::AuthorizationRequest;
use crate::errors::GatewayError;
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip_all, name = "gateway.handlers.authorize")]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let request: AuthorizationRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(target: "gateway.handlers.authorize", error = %e, "Unparseable authorization request");
        GatewayError::Unauthorized
    })?;

    let decision = state.authorizer.authorize(&request).await?;

    Ok(Json(decision.to_policy()).into_response())
}
