//! `POST /chat`: forward one user message to the agent and return its answer.
//!
//! Runs behind `require_auth`, so the caller's [`UserInfo`] is always present
//! in request extensions.

use crate::agent::{aggregate_stream, AgentRequest};
use crate::auth::UserInfo;
use crate::errors::GatewayError;
use crate::models::{ChatRequest, ChatResponse};
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Chat handler.
///
/// A missing or blank `sessionId` starts a new session with a fresh UUID.
/// The caller's id, email and name travel to the agent as session
/// attributes.
///
/// # Errors
///
/// - 400 when the body fails validation
/// - 403 / 429 / 500 when the agent call is denied, throttled or fails
///
/// A stream that breaks after the call succeeds is not an error: the answer
/// is the fixed apology text.
#[instrument(skip_all, name = "gateway.handlers.chat", fields(session_id))]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserInfo>,
    body: Bytes,
) -> Result<Json<ChatResponse>, GatewayError> {
    let request = ChatRequest::parse(&body)?;

    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::Span::current().record("session_id", session_id.as_str());

    let session_attributes = BTreeMap::from([
        ("userId".to_string(), user.user_id),
        ("userEmail".to_string(), user.email),
        ("userName".to_string(), user.name),
    ]);

    tracing::info!(
        target: "gateway.handlers.chat",
        message_chars = request.message.chars().count(),
        "Invoking agent"
    );

    let events = state
        .agent_client
        .invoke(AgentRequest {
            session_id: session_id.clone(),
            input_text: request.message,
            session_attributes,
        })
        .await?;

    let response = aggregate_stream(events).await;

    Ok(Json(ChatResponse {
        response,
        session_id,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
