//! Chat Gateway request and response models.

use crate::errors::GatewayError;
use serde::{Deserialize, Serialize};

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" when the process can answer.
    pub status: String,

    /// RFC 3339 UTC time of the check.
    pub timestamp: String,

    pub service: String,

    pub version: String,

    /// Deployment region.
    pub region: String,
}

/// Validated `POST /chat` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Trimmed, non-empty message.
    pub message: String,

    /// Client-supplied session, if any.
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Parse and validate a raw request body.
    ///
    /// # Errors
    ///
    /// `GatewayError::BadRequest` describing the first failed check.
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(GatewayError::BadRequest(
                "Request body is required".to_string(),
            ));
        }

        let body: serde_json::Value = serde_json::from_slice(body).map_err(|_| {
            GatewayError::BadRequest("Invalid JSON in request body".to_string())
        })?;

        let message = body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .filter(|message| !message.is_empty())
            .ok_or_else(|| {
                GatewayError::BadRequest("Message is required and must be a string".to_string())
            })?;

        if message.trim().is_empty() {
            return Err(GatewayError::BadRequest(
                "Message cannot be empty".to_string(),
            ));
        }

        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(GatewayError::BadRequest(format!(
                "Message too long (maximum {MAX_MESSAGE_CHARS} characters)"
            )));
        }

        let session_id = body
            .get("sessionId")
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(ToString::to_string);

        Ok(Self {
            message: message.trim().to_string(),
            session_id,
        })
    }
}

/// `POST /chat` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    /// RFC 3339 UTC time the answer was produced.
    pub timestamp: String,
}
